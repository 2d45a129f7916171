pub mod timeline;
pub mod timing;
