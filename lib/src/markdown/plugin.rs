use pulldown_cmark::Event;

/// A stage in the markdown event pipeline.
///
/// Plugins consume the event stream produced by the previous stage and yield
/// a rewritten stream. They run lazily; nothing happens until the final
/// iterator is driven.
pub trait Plugin<'e> {
    fn remap<I>(self, events: I) -> impl Iterator<Item = Event<'e>>
        where I: Iterator<Item = Event<'e>>;
}
