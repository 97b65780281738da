pub(crate) mod backend;
pub(crate) mod compositor;
pub(crate) mod subtitle;
pub(crate) mod text;
