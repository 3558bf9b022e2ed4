pub mod list;
pub mod reset;
pub mod set;
pub mod template;
