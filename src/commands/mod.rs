pub mod cancel;
pub mod create;
pub mod current;
pub mod edit;
pub mod list;
pub mod show;
