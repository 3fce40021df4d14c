//! # UPSplus Logger Library
//!
//! Log battery discharge profiles from a GeeekPi UPS Plus v5 (EP-0136).
//!
//! This library provides the register map and decoder for the board, a
//! sampler that turns one round of I2C reads into a [`sample::Sample`], and a
//! sampling loop that keeps writing CSV records while the battery runs down.

pub mod config;
pub mod error;
pub mod registers;
pub mod bus;
pub mod sample;
pub mod sampler;
pub mod sampling_loop;
pub mod sink;
pub mod report;
