//! Model serialization and persistence
//!
//! Models are stored in the LIBSVM text format: a header of `key value...`
//! lines, the line `SV`, then one line per support vector holding its
//! `nr_class - 1` coefficients followed by `index:value` pairs with 1-based
//! indices. Numbers are written with the shortest representation that
//! parses back to the same `f64`, so a reloaded model predicts exactly like
//! the one that was saved.
//!
//! A JSON export carrying [`ModelMetadata`] is available as well.

use crate::core::{KernelType, Result, SVMError, SparseVector, SvmParameter, SvmType};
use crate::model::SvmModel;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Model metadata for tracking and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl ModelMetadata {
    pub fn now() -> Self {
        Self {
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// JSON document: the model plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub metadata: ModelMetadata,
    pub model: SvmModel,
}

impl SvmModel {
    /// Save in LIBSVM text format
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_model(self, path)
    }

    /// Load a model saved in LIBSVM text format
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_model(path)
    }

    pub fn to_json(&self) -> Result<String> {
        let document = ModelDocument {
            metadata: ModelMetadata::now(),
            model: self.clone(),
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| SVMError::SerializationError(e.to_string()))
    }

    /// Parse a JSON document written by [`SvmModel::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ModelDocument =
            serde_json::from_str(json).map_err(|e| SVMError::SerializationError(e.to_string()))?;
        validate_model(&document.model)?;
        Ok(document.model)
    }
}

/// Save model to file
pub fn save_model<P: AsRef<Path>>(model: &SvmModel, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_model(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load model from file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<SvmModel> {
    let file = File::open(path)?;
    read_model(BufReader::new(file))
}

fn write_list<W: Write, T: Display>(writer: &mut W, key: &str, values: &[T]) -> Result<()> {
    write!(writer, "{key}")?;
    for value in values {
        write!(writer, " {value}")?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write `model` in LIBSVM text format
pub fn write_model<W: Write>(model: &SvmModel, writer: &mut W) -> Result<()> {
    let param = &model.param;

    writeln!(writer, "svm_type {}", param.svm_type)?;
    writeln!(writer, "kernel_type {}", param.kernel_type)?;
    if param.kernel_type == KernelType::Polynomial {
        writeln!(writer, "degree {}", param.degree)?;
    }
    if matches!(
        param.kernel_type,
        KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
    ) {
        writeln!(writer, "gamma {}", param.gamma)?;
    }
    if matches!(
        param.kernel_type,
        KernelType::Polynomial | KernelType::Sigmoid
    ) {
        writeln!(writer, "coef0 {}", param.coef0)?;
    }

    writeln!(writer, "nr_class {}", model.nr_class)?;
    writeln!(writer, "total_sv {}", model.sv.len())?;
    write_list(writer, "rho", &model.rho)?;

    if !model.label.is_empty() {
        write_list(writer, "label", &model.label)?;
    }
    if !model.prob_a.is_empty() {
        write_list(writer, "probA", &model.prob_a)?;
    }
    if !model.prob_b.is_empty() {
        write_list(writer, "probB", &model.prob_b)?;
    }
    if !model.prob_density_marks.is_empty() {
        write_list(writer, "prob_density_marks", &model.prob_density_marks)?;
    }
    if !model.n_sv.is_empty() {
        write_list(writer, "nr_sv", &model.n_sv)?;
    }

    writeln!(writer, "SV")?;
    for (i, sv) in model.sv.iter().enumerate() {
        let mut first = true;
        for row in &model.sv_coef {
            if !first {
                write!(writer, " ")?;
            }
            write!(writer, "{}", row[i])?;
            first = false;
        }
        for (index, value) in sv.iter() {
            if !first {
                write!(writer, " ")?;
            }
            write!(writer, "{}:{}", index + 1, value)?;
            first = false;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Header fields collected before the `SV` line
#[derive(Default)]
struct Header {
    svm_type: Option<SvmType>,
    kernel_type: Option<KernelType>,
    degree: Option<i32>,
    gamma: Option<f64>,
    coef0: Option<f64>,
    nr_class: Option<usize>,
    total_sv: Option<usize>,
    rho: Option<Vec<f64>>,
    label: Vec<i32>,
    prob_a: Vec<f64>,
    prob_b: Vec<f64>,
    prob_density_marks: Vec<f64>,
    n_sv: Vec<usize>,
}

fn format_error(line_no: usize, message: impl Display) -> SVMError {
    SVMError::ModelFormat(format!("line {line_no}: {message}"))
}

fn parse_token<T: FromStr>(token: &str, line_no: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| SVMError::ParseError(format!("line {line_no}: invalid number '{token}'")))
}

fn parse_list<T: FromStr>(tokens: &[&str], line_no: usize) -> Result<Vec<T>> {
    tokens.iter().map(|t| parse_token(t, line_no)).collect()
}

fn parse_single<T: FromStr>(key: &str, tokens: &[&str], line_no: usize) -> Result<T> {
    match tokens {
        [token] => parse_token(token, line_no),
        _ => Err(format_error(line_no, format!("'{key}' takes exactly one value"))),
    }
}

fn require<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| SVMError::ModelFormat(format!("missing header field '{key}'")))
}

/// Read a model in LIBSVM text format.
///
/// Either the whole model is returned or an error; support vector indices
/// into the training set are not part of the format and come back empty.
pub fn read_model<R: BufRead>(reader: R) -> Result<SvmModel> {
    let mut lines = reader.lines().enumerate();
    let mut header = Header::default();

    loop {
        let Some((n, line)) = lines.next() else {
            return Err(SVMError::ModelFormat("missing 'SV' section".to_string()));
        };
        let line = line?;
        let line_no = n + 1;

        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let rest: Vec<&str> = tokens.collect();

        match key {
            "svm_type" => {
                let name: String = parse_single(key, &rest, line_no)?;
                header.svm_type = Some(name.parse()?);
            }
            "kernel_type" => {
                let name: String = parse_single(key, &rest, line_no)?;
                header.kernel_type = Some(name.parse()?);
            }
            "degree" => header.degree = Some(parse_single(key, &rest, line_no)?),
            "gamma" => header.gamma = Some(parse_single(key, &rest, line_no)?),
            "coef0" => header.coef0 = Some(parse_single(key, &rest, line_no)?),
            "nr_class" => header.nr_class = Some(parse_single(key, &rest, line_no)?),
            "total_sv" => header.total_sv = Some(parse_single(key, &rest, line_no)?),
            "rho" => header.rho = Some(parse_list(&rest, line_no)?),
            "label" => header.label = parse_list(&rest, line_no)?,
            "probA" => header.prob_a = parse_list(&rest, line_no)?,
            "probB" => header.prob_b = parse_list(&rest, line_no)?,
            "prob_density_marks" => header.prob_density_marks = parse_list(&rest, line_no)?,
            "nr_sv" => header.n_sv = parse_list(&rest, line_no)?,
            "SV" => break,
            other => return Err(format_error(line_no, format!("unknown header field '{other}'"))),
        }
    }

    let svm_type = require(header.svm_type, "svm_type")?;
    let kernel_type = require(header.kernel_type, "kernel_type")?;
    let nr_class = require(header.nr_class, "nr_class")?;
    let total_sv = require(header.total_sv, "total_sv")?;
    let rho = require(header.rho, "rho")?;

    let defaults = SvmParameter::default();
    let degree = match kernel_type {
        KernelType::Polynomial => require(header.degree, "degree")?,
        _ => header.degree.unwrap_or(defaults.degree),
    };
    let gamma = match kernel_type {
        KernelType::Linear => header.gamma.unwrap_or(defaults.gamma),
        _ => require(header.gamma, "gamma")?,
    };
    let coef0 = match kernel_type {
        KernelType::Polynomial | KernelType::Sigmoid => require(header.coef0, "coef0")?,
        _ => header.coef0.unwrap_or(defaults.coef0),
    };

    // Counts from the header are untrusted until tied to the rho line
    if nr_class == 0 || pair_count(nr_class) != Some(rho.len()) {
        return Err(SVMError::ModelFormat(format!(
            "nr_class {nr_class} does not match {} rho values",
            rho.len()
        )));
    }
    let mut sv_coef: Vec<Vec<f64>> = vec![Vec::new(); nr_class - 1];
    let mut sv = Vec::new();

    for (n, line) in lines {
        let line = line?;
        let line_no = n + 1;
        if line.trim().is_empty() {
            continue;
        }
        if sv.len() == total_sv {
            return Err(format_error(
                line_no,
                format!("more support vectors than total_sv = {total_sv}"),
            ));
        }

        let mut tokens = line.split_whitespace();
        for row in sv_coef.iter_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| format_error(line_no, "missing coefficient"))?;
            row.push(parse_token(token, line_no)?);
        }

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for token in tokens {
            let (index, value) = token
                .split_once(':')
                .ok_or_else(|| SVMError::ParseError(format!("line {line_no}: expected index:value, got '{token}'")))?;
            let index: usize = parse_token(index, line_no)?;
            if index == 0 {
                return Err(SVMError::ParseError(format!(
                    "line {line_no}: feature indices start at 1"
                )));
            }
            if indices.last().is_some_and(|&last| index - 1 <= last) {
                return Err(SVMError::ParseError(format!(
                    "line {line_no}: feature indices must be strictly increasing"
                )));
            }
            indices.push(index - 1);
            values.push(parse_token(value, line_no)?);
        }
        sv.push(SparseVector { indices, values });
    }

    if sv.len() != total_sv {
        return Err(SVMError::ModelFormat(format!(
            "expected {total_sv} support vectors, found {}",
            sv.len()
        )));
    }

    let probability = !header.prob_a.is_empty() || !header.prob_density_marks.is_empty();
    let model = SvmModel {
        param: SvmParameter {
            svm_type,
            kernel_type,
            degree,
            gamma,
            coef0,
            probability,
            ..defaults
        },
        nr_class,
        sv,
        sv_coef,
        rho,
        prob_a: header.prob_a,
        prob_b: header.prob_b,
        prob_density_marks: header.prob_density_marks,
        sv_indices: Vec::new(),
        label: header.label,
        n_sv: header.n_sv,
    };
    validate_model(&model)?;
    Ok(model)
}

/// Check that the parts of a model agree with each other
/// `k(k-1)/2`, or `None` on overflow
fn pair_count(nr_class: usize) -> Option<usize> {
    nr_class
        .checked_mul(nr_class.saturating_sub(1))
        .map(|n| n / 2)
}

fn validate_model(model: &SvmModel) -> Result<()> {
    let bad = |message: String| Err(SVMError::ModelFormat(message));

    let nr_class = model.nr_class;
    let total_sv = model.sv.len();
    if nr_class == 0 {
        return bad("nr_class must be at least 1".to_string());
    }
    let Some(n_pairs) = pair_count(nr_class) else {
        return bad(format!("nr_class {nr_class} is too large"));
    };
    if model.rho.len() != n_pairs {
        return bad(format!("expected {n_pairs} rho values, found {}", model.rho.len()));
    }
    if model.sv_coef.len() != nr_class - 1 {
        return bad(format!(
            "expected {} coefficient rows, found {}",
            nr_class - 1,
            model.sv_coef.len()
        ));
    }
    if model.sv_coef.iter().any(|row| row.len() != total_sv) {
        return bad("coefficient rows do not match total_sv".to_string());
    }

    if model.param.svm_type.is_classification() {
        if model.label.len() != nr_class {
            return bad(format!("expected {nr_class} labels, found {}", model.label.len()));
        }
        if model.n_sv.len() != nr_class {
            return bad(format!("expected {nr_class} nr_sv values, found {}", model.n_sv.len()));
        }
        if model.n_sv.iter().sum::<usize>() != total_sv {
            return bad("nr_sv does not add up to total_sv".to_string());
        }
        if !model.prob_a.is_empty() && model.prob_a.len() != n_pairs {
            return bad(format!("expected {n_pairs} probA values, found {}", model.prob_a.len()));
        }
        if model.prob_a.len() != model.prob_b.len() {
            return bad("probA and probB lengths differ".to_string());
        }
    } else {
        if nr_class != 2 {
            return bad(format!(
                "{} models have nr_class 2, found {nr_class}",
                model.param.svm_type
            ));
        }
        if model.param.svm_type.is_regression() && model.prob_a.len() > 1 {
            return bad("regression models have at most one probA value".to_string());
        }
    }

    if !model.sv_indices.is_empty() && model.sv_indices.len() != total_sv {
        return bad("sv_indices do not match total_sv".to_string());
    }
    for sv in &model.sv {
        if sv.indices.len() != sv.values.len() {
            return bad("support vector indices and values differ in length".to_string());
        }
        if sv.indices.windows(2).any(|w| w[0] >= w[1]) {
            return bad("support vector indices are not strictly increasing".to_string());
        }
    }
    Ok(())
}
