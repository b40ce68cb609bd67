/// Constants used by the catalog loader.
pub mod catalog {
    /// Default directory scanned for dataset files.
    pub const DEFAULT_DATA_DIR: &str = "data";
    /// Extension (without the dot) of dataset files.
    pub const DATASET_FILE_EXTENSION: &str = "json";
    /// Sample field holding the video URL.
    pub const FIELD_VIDEO_URL: &str = "video_url";
    /// Sample field holding the question text.
    pub const FIELD_QUESTION: &str = "question";
    /// Sample field holding the answer options.
    pub const FIELD_OPTIONS: &str = "options";
    /// Sample field holding the reference answer.
    pub const FIELD_ANSWER: &str = "answer";
}

/// Constants used by the error annotation store.
pub mod error_flags {
    /// Error categories known to a default service, in declaration order.
    pub const DEFAULT_ERROR_CATEGORIES: [&str; 4] =
        ["Misalignment", "Wrong", "Single Frame Bias", "Others"];
    /// Directory holding one unit per category.
    pub const ERROR_UNIT_DIR: &str = "error_annotation";
}

/// Constants used by the repurposing store.
pub mod repurpose {
    /// Unit holding the primary list of repurposed items.
    pub const REPURPOSED_ITEMS_UNIT: &str = "repurpose_data/repurposed_vqa.json";
    /// Unit holding the derived dataset -> positions index.
    pub const REPURPOSED_INDEX_UNIT: &str = "repurpose_data/repurposed_indices.json";
}

/// Constants used by the selection and caption stores.
pub mod selection {
    /// Unit holding selection markers.
    pub const SELECTED_UNIT: &str = "selected_data/selected_vqa.json";
    /// Unit holding captions.
    pub const CAPTIONS_UNIT: &str = "selected_data/selected_captions.json";
}

/// Constants used by persistence backends.
pub mod persistence {
    /// Default root directory for persisted units.
    pub const DEFAULT_STORE_ROOT: &str = ".";
    /// Suffix appended to a unit's file while it is being replaced.
    pub const TEMP_FILE_SUFFIX: &str = "tmp";
}
