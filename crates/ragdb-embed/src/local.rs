//! Local transformer embedding backend (XLM-RoBERTa class models such as
//! BGE-M3), mean-pooled and L2-normalized.
//!
//! Inference runs on CPU inside the calling task; the HTTP backend in
//! `remote.rs` is the suspending alternative when the model is hosted
//! elsewhere.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use ragdb_core::traits::EmbeddingBackend;
use ragdb_core::types::EmbeddingVector;

pub const DEFAULT_DIM: usize = 1024;

const MAX_SEQ_LEN: usize = 256;
// XLM-RoBERTa pad token id.
const PAD_ID: u32 = 1;

pub struct LocalBackend {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

impl LocalBackend {
    /// Load tokenizer, config and weights from `model_dir`. The directory
    /// must contain `tokenizer.json`, `config.json` and `pytorch_model.bin`.
    pub fn load(model_dir: &Path, dim: usize) -> Result<Self> {
        let device = Device::Cpu;
        tracing::info!(dir = %model_dir.display(), "loading local embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!(
                "failed to load tokenizer from {}: {}",
                tokenizer_path.display(),
                e
            )
        })?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> =
            weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        tracing::info!("local embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
        })
    }

    fn embed_text(&self, text: &str) -> Result<EmbeddingVector> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > MAX_SEQ_LEN {
            ids.truncate(MAX_SEQ_LEN);
            mask.truncate(MAX_SEQ_LEN);
        }
        if ids.len() < MAX_SEQ_LEN {
            let pad = MAX_SEQ_LEN - ids.len();
            ids.extend(std::iter::repeat(PAD_ID).take(pad));
            mask.extend(std::iter::repeat(0).take(pad));
        }

        let input_ids = Tensor::from_iter(ids, &self.device)?.reshape((1, MAX_SEQ_LEN))?;
        let attention_mask = Tensor::from_iter(mask, &self.device)?.reshape((1, MAX_SEQ_LEN))?;
        let token_type_ids = Tensor::zeros((1, MAX_SEQ_LEN), DType::I64, &self.device)?;
        let hidden = self.model.forward(
            &input_ids,
            &attention_mask,
            &token_type_ids,
            None,
            None,
            None,
        )?;

        // Mean pooling over non-padding positions.
        let hidden_dim = hidden.dims()[2];
        let mask = attention_mask
            .to_device(hidden.device())?
            .to_dtype(hidden.dtype())?;
        let mask_3d = mask.unsqueeze(2)?;
        let mask_b = mask_3d
            .broadcast_as(hidden.shape())
            .unwrap_or(mask_3d.repeat((1, 1, hidden_dim))?);
        let masked = (&hidden * &mask_b)?;
        let sum = masked.sum(1)?;
        let lens = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
        let mut emb = sum.broadcast_div(&lens)?;

        // L2 normalize.
        let eps = Tensor::new(&[1e-12f32], hidden.device())?
            .to_dtype(hidden.dtype())?
            .unsqueeze(0)?;
        let norm = emb.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
        emb = emb.broadcast_div(&norm)?;

        let out: Vec<f32> = emb.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if out.len() != self.dim {
            return Err(anyhow!(
                "model produced dimension {} but {} was configured",
                out.len(),
                self.dim
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}
