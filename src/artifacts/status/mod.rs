pub mod status_info;
