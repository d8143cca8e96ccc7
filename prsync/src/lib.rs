//! Bandwidth-capped copying of many source/destination pairs at once - `prsync`
//!
//! `prsync` copies files and directory trees similar to `rsync`, but always transfers whole files.
//! A file is skipped when its destination was modified at the same time or after the source.
//!
//! # Usage
//!
//! ```bash
//! # copy two trees at once, 512 KB/s each
//! prsync --pairs /data/a:/backup,/data/b/:/backup/b --bandwidth 512 --progress
//!
//! # single file, print what was done
//! prsync --pairs notes.txt:/mnt/usb/ --summary
//! ```
//!
//! A directory written with a trailing slash (`/data/b/`) has its contents copied into the
//! destination, without it (`/data/a`) the directory itself is created inside the destination.
//!
//! Every pair gets its own worker, rate limiter and progress line. A failing pair does not stop
//! the others; `prsync` exits with a non-zero status when any of them failed.

pub mod pairs;
