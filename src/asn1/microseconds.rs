/// ```text
/// Microseconds    ::= INTEGER (0..999999)
///                     -- microseconds
/// ````
pub(crate) type Microseconds = u32;
