/// CSV readers and writers for run, parsed, presentation, and consensus files.
pub mod csv;
