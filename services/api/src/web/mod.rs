pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    chat_handler, create_resource_handler, delete_resource_handler, generate_resource_handler,
    get_resource_handler, limits_handler, list_resources_handler, record_focus_handler,
    stats_handler,
};
