mod clipboard;
mod exporter;
mod naming;

pub use {clipboard::ClipboardService, exporter::Exporter, naming::recording_file_name};

#[cfg(test)]
pub(crate) use naming::claim_destination_within;
