use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Class id to display name mapping.
#[derive(Clone, Debug)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::new(COCO_NAMES.iter().map(|s| s.to_string()).collect())
    }

    /// Load names from a `.json` array of strings, or one name per line otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels file {}", path.display()))?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::parse_json(&text)
                .with_context(|| format!("Invalid JSON labels in {}", path.display()))
        } else {
            Ok(Self::parse_lines(&text))
        }
    }

    pub fn parse_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn parse_json(text: &str) -> Result<Self> {
        let names: Vec<String> = serde_json::from_str(text)?;
        Ok(Self::new(names))
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.names.get(class_id) {
            Some(name) => name.clone(),
            None => format!("class{}", class_id),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Match the table to the class count the model actually emits.
    ///
    /// A user-supplied table is kept even on mismatch. The built-in COCO table is
    /// dropped for any other class count, so ids render as `class{id}`.
    pub fn reconcile(self, class_count: usize, from_file: bool) -> Self {
        if self.len() == class_count {
            return self;
        }
        if from_file {
            log::warn!(
                "Labels file lists {} names but the model emits {} classes",
                self.len(),
                class_count
            );
            self
        } else {
            log::warn!(
                "Model emits {} classes, not the {} COCO classes; pass --labels to name them",
                class_count,
                self.len()
            );
            Self::new(Vec::new())
        }
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::coco()
    }
}
