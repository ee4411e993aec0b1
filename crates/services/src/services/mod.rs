pub mod debounce;
pub mod execution_view;
pub mod notification;
pub mod projection;
pub mod view_store;
