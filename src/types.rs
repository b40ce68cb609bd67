/// Name of a dataset in the catalog (the dataset file stem).
/// Examples: `random_200_tempcompass_qa_json`, `d1`
pub type DatasetName = String;
/// Name of an error category.
/// Examples: `Misalignment`, `Wrong`, `Single Frame Bias`, `Others`
pub type CategoryName = String;
/// 0-based index of a sample within its dataset's catalog sequence.
pub type Position = usize;
/// 0-based rank of an item within the subset of a store list that shares one sample.
pub type Rank = usize;
/// Name of a persisted unit (a path relative to the persistence root).
/// Example: `repurpose_data/repurposed_vqa.json`
pub type UnitName = String;
