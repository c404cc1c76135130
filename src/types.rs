/// Item identifier as it appears in the `id` column of every input file.
/// Examples: `7`, `1532`
pub type ItemId = String;
/// Identifier for one independent generation run.
/// Examples: `run_1`, `run_2`, `run_3`
pub type RunId = String;
/// Candidate phrase text offered for an item.
/// Examples: `Sono una minaccia`, `Sono subdoli`, `Rovinano l'Italia`
pub type Phrase = String;
/// CSV column header name.
/// Examples: `id`, `05`, `parsed_output`
pub type ColumnName = String;
