pub mod config;
pub mod file_tree;
pub mod join_row;
