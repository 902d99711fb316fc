use minijinja::value::Value;
use minijinja::Error;

/// `{{ "My Post" | normalize }}` yields the post's address, `my-post`.
pub fn normalize(value: &str) -> String {
    crate::address::normalize(value).into()
}

pub fn deslug(value: &str) -> String {
    value.replace('-', " ")
}

pub fn split(value: &str, pat: &str, n: Option<usize>) -> Result<Value, Error> {
    match n {
        Some(n) => Ok(value.split(pat).nth(n).map(Value::from).unwrap_or(Value::UNDEFINED)),
        None => Ok(value.split(pat).map(Value::from).collect()),
    }
}
