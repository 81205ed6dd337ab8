#![allow(clippy::unwrap_used)]

mod clipboard;
