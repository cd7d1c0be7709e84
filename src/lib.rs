//! Live recording feedback for raw PCM16 audio.
//!
//! | Module     | Role                                                    |
//! |------------|---------------------------------------------------------|
//! | [`audio`]  | Pure engines: conversion, levels, bars, spectrum, preprocessing |
//! | [`worker`] | Background context, request correlation, timeouts, fallback |
//! | [`config`] | `settings.toml` persistence                             |

pub mod audio;
pub mod config;
pub mod worker;
