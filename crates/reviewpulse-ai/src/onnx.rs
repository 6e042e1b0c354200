//! ONNX Runtime sentiment model for sequence-classification transformers.
//!
//! Targets DistilBERT fine-tuned on SST-2 (two labels). The model directory
//! must contain `model.onnx` and `tokenizer.json`; `config.json` is read for
//! `id2label` when present.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use ort::session::Session;
use ort::value::Tensor;
use reviewpulse_core::Label;
use tokenizers::{Encoding, Tokenizer};
use tracing::info;

use crate::model::{Prediction, SentimentModel};
use crate::ClassifyError;

/// Label order for SST-2 checkpoints without a `config.json`.
const DEFAULT_LABELS: [Label; 2] = [Label::Negative, Label::Positive];

/// Binary sentiment classifier running a transformer through ONNX Runtime.
pub struct OnnxSentimentModel {
    session: Session,
    tokenizer: Tokenizer,
    id2label: Vec<Label>,
    needs_token_type_ids: bool,
    name: String,
}

impl OnnxSentimentModel {
    /// Load a model from a directory containing `model.onnx` and `tokenizer.json`.
    ///
    /// Any failure is reported as [`ClassifyError::ModelUnavailable`].
    pub fn load(model_dir: &Path, max_tokens: usize) -> Result<Self, ClassifyError> {
        Self::load_inner(model_dir, max_tokens)
            .map_err(|e| ClassifyError::ModelUnavailable(format!("{e:#}")))
    }

    fn load_inner(model_dir: &Path, max_tokens: usize) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let needs_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Pad every input in a batch to the longest one.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        let id2label = read_id2label(&model_dir.join("config.json"))?;
        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(
            model = %model_path.display(),
            labels = ?id2label,
            max_tokens,
            "loaded sentiment model"
        );
        Ok(Self {
            session,
            tokenizer,
            id2label,
            needs_token_type_ids,
            name,
        })
    }

    fn encode(&self, texts: &[&str]) -> anyhow::Result<InputBatch> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        Ok(InputBatch::new(&encodings, |e: &Encoding| {
            [e.get_ids(), e.get_attention_mask(), e.get_type_ids()]
        }))
    }

    fn run_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Prediction>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = texts.len();
        let inputs = self.encode(texts)?;
        let shape = inputs.shape();
        let ids_tensor = Tensor::from_array((shape, inputs.input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, inputs.attention_mask.into_boxed_slice()))?;

        // DistilBERT exports take no token_type_ids; BERT-style exports do.
        let outputs = if self.needs_token_type_ids {
            let type_tensor =
                Tensor::from_array((shape, inputs.token_type_ids.into_boxed_slice()))?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [batch_size, num_labels].
        let (output_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        let num_labels = self.id2label.len();
        anyhow::ensure!(
            dims.len() == 2 && dims[0] as usize == batch_size && dims[1] as usize == num_labels,
            "unexpected output shape: {dims:?}, expected [{batch_size}, {num_labels}]"
        );

        let predictions = logits
            .chunks(num_labels)
            .map(|row| {
                let probs = softmax(row);
                let (best, &p) = probs
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .context("empty logits row")?;
                Ok(Prediction {
                    label: self.id2label[best],
                    confidence: p,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(predictions)
    }
}

impl SentimentModel for OnnxSentimentModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_batch(&mut self, texts: &[&str]) -> Result<Vec<Prediction>, ClassifyError> {
        self.run_batch(texts)
            .map_err(|e| ClassifyError::Inference(format!("{e:#}")))
    }
}

/// Row-major `[rows, seq_len]` model inputs, zero-padded to the longest row.
#[derive(Debug, PartialEq)]
struct InputBatch {
    rows: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

impl InputBatch {
    /// `fields` yields `[ids, attention_mask, type_ids]` for one row.
    fn new<T>(rows: &[T], fields: impl Fn(&T) -> [&[u32]; 3]) -> Self {
        let seq_len = rows.iter().map(|r| fields(r)[0].len()).max().unwrap_or(0);
        let mut columns: [Vec<i64>; 3] = Default::default();
        for row in rows {
            for (column, values) in columns.iter_mut().zip(fields(row)) {
                let values = &values[..values.len().min(seq_len)];
                column.extend(values.iter().map(|&v| i64::from(v)));
                column.resize(column.len() + seq_len - values.len(), 0);
            }
        }
        let [input_ids, attention_mask, token_type_ids] = columns;
        Self {
            rows: rows.len(),
            seq_len,
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    fn shape(&self) -> [i64; 2] {
        [self.rows as i64, self.seq_len as i64]
    }
}

/// Read `id2label` from a Hugging Face `config.json`, falling back to SST-2 order.
fn read_id2label(config_path: &Path) -> anyhow::Result<Vec<Label>> {
    if !config_path.exists() {
        return Ok(DEFAULT_LABELS.to_vec());
    }
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("read {}", config_path.display()))?;
    parse_id2label(&raw)
}

fn parse_id2label(raw: &str) -> anyhow::Result<Vec<Label>> {
    #[derive(serde::Deserialize)]
    struct HfConfig {
        #[serde(default)]
        id2label: HashMap<String, String>,
    }

    let config: HfConfig = serde_json::from_str(raw).context("parse config.json")?;
    if config.id2label.is_empty() {
        return Ok(DEFAULT_LABELS.to_vec());
    }

    let mut entries = config
        .id2label
        .into_iter()
        .map(|(id, name)| {
            let id: usize = id.parse().with_context(|| format!("bad label id {id:?}"))?;
            let label: Label = name.parse()?;
            Ok((id, label))
        })
        .collect::<anyhow::Result<Vec<(usize, Label)>>>()?;
    entries.sort_by_key(|(id, _)| *id);

    anyhow::ensure!(
        entries.len() == 2 && entries.iter().enumerate().all(|(i, (id, _))| i == *id),
        "expected binary id2label {{0, 1}}, got {entries:?}"
    );
    Ok(entries.into_iter().map(|(_, label)| label).collect())
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
