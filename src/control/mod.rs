pub mod calibration;
pub mod controller;
pub mod filter;
pub mod gain_schedule;
pub mod pid;
pub mod safety;
