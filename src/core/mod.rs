pub mod config;
pub mod detection;
pub mod detection_loop;
pub mod detector;
pub mod dnn_detector;
pub mod fps;
pub mod labels;
pub mod nms;
