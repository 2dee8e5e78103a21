//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Labels are kept as written (class labels or regression targets).
//! Feature indices are 1-based in the file and must be strictly increasing.

use crate::core::{Dataset, Problem, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for LibSVM format files
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut max_dimension = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line) {
                Ok((sample, max_idx)) => {
                    samples.push(sample);
                    max_dimension = max_dimension.max(max_idx + 1);
                }
                Err(e) => {
                    return Err(SVMError::ParseError(format!(
                        "Error parsing line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }

        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        Ok(LibSVMDataset {
            samples,
            dimensions: max_dimension,
        })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<(Sample, usize)> {
        let mut parts = line.split_whitespace();

        let label_str = parts
            .next()
            .ok_or_else(|| SVMError::ParseError("Empty line".to_string()))?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| SVMError::ParseError(format!("Invalid label: {}", label_str)))?;
        if !label.is_finite() {
            return Err(SVMError::ParseError(format!("Invalid label: {}", label_str)));
        }

        // Parse feature:value pairs
        let mut indices: Vec<usize> = Vec::new();
        let mut values = Vec::new();

        for feature_str in parts {
            let (index_str, value_str) = feature_str.split_once(':').ok_or_else(|| {
                SVMError::ParseError(format!("Invalid feature format: {}", feature_str))
            })?;

            let index = index_str.parse::<usize>().map_err(|_| {
                SVMError::ParseError(format!("Invalid feature index: {}", index_str))
            })?;

            let value = value_str.parse::<f64>().map_err(|_| {
                SVMError::ParseError(format!("Invalid feature value: {}", value_str))
            })?;

            // libsvm uses 1-based indexing, convert to 0-based
            let zero_based_index = if index > 0 {
                index - 1
            } else {
                return Err(SVMError::ParseError(format!(
                    "Feature index must be positive: {}",
                    index
                )));
            };

            if indices.last().is_some_and(|&last| zero_based_index <= last) {
                return Err(SVMError::ParseError(format!(
                    "Feature indices must be strictly increasing: {}",
                    index
                )));
            }

            indices.push(zero_based_index);
            values.push(value);
        }

        let max_index = indices.last().copied().unwrap_or(0);
        let features = SparseVector { indices, values };
        let sample = Sample::new(features, label);

        Ok((sample, max_index))
    }

    /// Labels (or regression targets) and feature vectors as a training problem
    pub fn to_problem(&self) -> Problem {
        Problem::from_samples(&self.samples)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line_basic() {
        let line = "+1 1:0.5 3:1.2";
        let (sample, max_idx) = LibSVMDataset::parse_line(line).unwrap();

        assert_eq!(sample.label, 1.0);
        assert_eq!(sample.features.indices, vec![0, 2]); // 1-based to 0-based
        assert_eq!(sample.features.values, vec![0.5, 1.2]);
        assert_eq!(max_idx, 2);
    }

    #[test]
    fn test_parse_line_negative_label() {
        let line = "-1 2:0.3 5:2.1";
        let (sample, max_idx) = LibSVMDataset::parse_line(line).unwrap();

        assert_eq!(sample.label, -1.0);
        assert_eq!(sample.features.indices, vec![1, 4]); // 1-based to 0-based
        assert_eq!(sample.features.values, vec![0.3, 2.1]);
        assert_eq!(max_idx, 4);
    }

    #[test]
    fn test_parse_line_keeps_labels() {
        let (sample, _) = LibSVMDataset::parse_line("3 1:1.0").unwrap();
        assert_eq!(sample.label, 3.0);

        let (sample, _) = LibSVMDataset::parse_line("-0.25 1:1.0").unwrap();
        assert_eq!(sample.label, -0.25);

        // A line with no features is an all-zero vector
        let (sample, max_idx) = LibSVMDataset::parse_line("2").unwrap();
        assert!(sample.features.is_empty());
        assert_eq!(max_idx, 0);
    }

    #[test]
    fn test_parse_line_invalid_format() {
        // Invalid feature format
        let result = LibSVMDataset::parse_line("+1 1");
        assert!(result.is_err());

        // Invalid index
        let result = LibSVMDataset::parse_line("+1 abc:1.0");
        assert!(result.is_err());

        // Invalid value
        let result = LibSVMDataset::parse_line("+1 1:abc");
        assert!(result.is_err());

        // Zero index (libsvm is 1-based)
        let result = LibSVMDataset::parse_line("+1 0:1.0");
        assert!(result.is_err());

        // Unordered and duplicate indices
        assert!(LibSVMDataset::parse_line("+1 3:1.0 2:1.0").is_err());
        assert!(LibSVMDataset::parse_line("+1 2:1.0 2:1.0").is_err());

        // Non-numeric label
        assert!(LibSVMDataset::parse_line("yes 1:1.0").is_err());
    }

    #[test]
    fn test_from_reader_basic() {
        let data = "+1 1:0.5 3:1.2\n-1 2:0.3 5:2.1\n";
        let reader = Cursor::new(data);

        let dataset = LibSVMDataset::from_reader(reader).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5); // max index is 4 (0-based), so dimension is 5

        let sample1 = dataset.get_sample(0);
        assert_eq!(sample1.label, 1.0);
        assert_eq!(sample1.features.indices, vec![0, 2]);

        let sample2 = dataset.get_sample(1);
        assert_eq!(sample2.label, -1.0);
        assert_eq!(sample2.features.indices, vec![1, 4]);
    }

    #[test]
    fn test_from_reader_empty_lines_and_comments() {
        let data = "# Comment line\n+1 1:0.5\n\n# Another comment\n-1 2:0.3\n";
        let reader = Cursor::new(data);

        let dataset = LibSVMDataset::from_reader(reader).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get_labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_reader_empty_dataset() {
        let data = "# Only comments\n\n";
        let reader = Cursor::new(data);

        let result = LibSVMDataset::from_reader(reader);
        assert!(matches!(result, Err(SVMError::EmptyDataset)));
    }

    #[test]
    fn test_dataset_trait_implementation() {
        let data = "+1 1:0.5 3:1.2\n-1 2:0.3\n";
        let reader = Cursor::new(data);
        let dataset = LibSVMDataset::from_reader(reader).unwrap();

        // Test Dataset trait methods
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 3); // max index is 2, so dimension is 3
        assert!(!dataset.is_empty());

        let labels = dataset.get_labels();
        assert_eq!(labels, vec![1.0, -1.0]);

        let batch = dataset.get_batch(&[0, 1]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].label, 1.0);
        assert_eq!(batch[1].label, -1.0);
    }

    #[test]
    fn test_to_problem_trains() {
        use crate::core::{KernelType, SvmParameter};
        use crate::optimizer::train;

        // Create a simple linearly separable dataset
        let data = "+1 1:2.0\n-1 1:-2.0\n+1 1:1.5\n-1 1:-1.5\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).unwrap();
        let problem = dataset.to_problem();

        assert_eq!(problem.len(), 4);
        assert_eq!(problem.y, vec![1.0, -1.0, 1.0, -1.0]);

        let param = SvmParameter {
            kernel_type: KernelType::Linear,
            ..Default::default()
        };
        let model = train(&problem, &param).expect("Should train successfully");
        for (x, &y) in problem.x.iter().zip(&problem.y) {
            assert_eq!(model.predict(x), y);
        }
    }

    #[test]
    fn test_large_dimension_handling() {
        // Test with large sparse indices
        let data = "+1 1:1.0 1000:2.0 5000:3.0\n-1 2:1.0 500:2.0\n";
        let reader = Cursor::new(data);
        let dataset = LibSVMDataset::from_reader(reader).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5000); // max index is 4999 (0-based), so dimension is 5000

        // Verify sparse vector efficiency - indices should be sorted
        let sample = dataset.get_sample(0);
        assert_eq!(sample.features.indices, vec![0, 999, 4999]); // 0-based indices
        assert_eq!(sample.features.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        // Create a temporary file with libsvm data
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:0.5 3:1.2").expect("Failed to write");
        writeln!(temp_file, "-1 2:0.3 5:2.1").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        // Test loading from file
        let dataset = LibSVMDataset::from_file(temp_file.path()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5);
        assert_eq!(dataset.get_labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_file_io_error() {
        // Test with non-existent file
        let result = LibSVMDataset::from_file("/non/existent/file.libsvm");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), SVMError::IoError(_)));
    }
}
