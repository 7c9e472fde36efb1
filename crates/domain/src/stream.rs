use std::pin::Pin;

/// A boxed async stream, used for chunk sequences and their wire encodings.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;
