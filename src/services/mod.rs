pub mod charts_api;
