//! This module contains various tools that help the ergonomics of this crate.

mod human_readable;
pub(crate) mod logging;

pub(crate) use human_readable::human_readable_list;
