pub(crate) mod estimate;
pub(crate) mod timeline;
