pub(crate) mod compare;
pub(crate) mod meta;
pub(crate) mod scrape;
pub(crate) mod shared;
pub(crate) mod sync;
pub(crate) mod validate;
