//! Tokenization and chat-template rendering for the trainer

use std::path::Path;

use serde::{Deserialize, Serialize};

use ivrl_core::{ChatMessage, IvrlError, Result, Role};

/// Mask value for positions excluded from the loss
pub const MASKED: i64 = -100;

/// Text <-> token id conversion
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}

impl TokenCodec for tokenizers::Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self)
            .encode(text, false)
            .map(|enc| enc.get_ids().to_vec())
            .map_err(|e| IvrlError::Tokenizer(e.to_string()))
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self)
            .decode(ids, false)
            .map_err(|e| IvrlError::Tokenizer(e.to_string()))
    }
}

/// Load a HuggingFace `tokenizer.json`
pub fn load_tokenizer(path: impl AsRef<Path>) -> Result<tokenizers::Tokenizer> {
    let path = path.as_ref();
    tokenizers::Tokenizer::from_file(path)
        .map_err(|e| IvrlError::Tokenizer(format!("Failed to load {}: {e}", path.display())))
}

/// Chat formats understood by the supported models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTemplate {
    /// `<|im_start|>role ... <|im_end|>`
    ChatMl,
    /// Llama 3 header/eot format
    #[default]
    Llama3,
}

impl ChatTemplate {
    /// Render messages into a single prompt string. With
    /// `add_generation_prompt` the result ends with an open assistant turn.
    pub fn render(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> String {
        let mut out = String::new();
        match self {
            ChatTemplate::ChatMl => {
                for m in messages {
                    out.push_str(&format!("<|im_start|>{}\n{}<|im_end|>\n", m.role, m.content));
                }
                if add_generation_prompt {
                    out.push_str("<|im_start|>assistant\n");
                }
            }
            ChatTemplate::Llama3 => {
                out.push_str("<|begin_of_text|>");
                for m in messages {
                    out.push_str(&format!(
                        "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>",
                        m.role, m.content
                    ));
                }
                if add_generation_prompt {
                    out.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
                }
            }
        }
        out
    }
}

/// Token ids and loss mask for one conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerTokens {
    pub tokens: Vec<u32>,
    pub masks: Vec<i64>,
}

impl TrainerTokens {
    /// Positions that contribute to the loss
    pub fn unmasked(&self) -> usize {
        self.masks.iter().filter(|&&m| m != MASKED).count()
    }
}

/// Tokenize a conversation for the trainer: everything up to the trailing
/// assistant turn is masked, the assistant tokens keep their ids.
pub fn tokenize_for_trainer(
    codec: &dyn TokenCodec,
    template: ChatTemplate,
    messages: &[ChatMessage],
) -> Result<TrainerTokens> {
    let prompt_len = messages
        .iter()
        .rposition(|m| m.role != Role::Assistant)
        .map_or(0, |i| i + 1);

    let prefix = codec.encode(&template.render(&messages[..prompt_len], true))?;
    let tokens = codec.encode(&template.render(messages, false))?;

    let shared = prefix
        .iter()
        .zip(&tokens)
        .take_while(|(a, b)| a == b)
        .count();

    let masks = tokens
        .iter()
        .enumerate()
        .map(|(i, &id)| if i < shared { MASKED } else { i64::from(id) })
        .collect();

    Ok(TrainerTokens { tokens, masks })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// One token per character; enough to exercise masking and length rules
    pub struct CharCodec;

    impl TokenCodec for CharCodec {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.chars().map(u32::from).collect())
        }

        fn decode(&self, ids: &[u32]) -> Result<String> {
            ids.iter()
                .map(|&id| {
                    char::from_u32(id)
                        .ok_or_else(|| IvrlError::Tokenizer(format!("invalid id {id}")))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::CharCodec;
    use super::*;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("sys"),
            ChatMessage::user("question"),
            ChatMessage::assistant("the answer"),
        ]
    }

    #[test]
    fn test_chatml_render() {
        let text = ChatTemplate::ChatMl.render(&conversation()[..2], true);
        assert_eq!(
            text,
            "<|im_start|>system\nsys<|im_end|>\n<|im_start|>user\nquestion<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_llama3_render() {
        let text = ChatTemplate::Llama3.render(&[ChatMessage::user("hi")], false);
        assert_eq!(
            text,
            "<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n\nhi<|eot_id|>"
        );
    }

    #[test]
    fn test_masks_cover_prompt_only() {
        let out = tokenize_for_trainer(&CharCodec, ChatTemplate::ChatMl, &conversation()).unwrap();
        assert_eq!(out.tokens.len(), out.masks.len());

        let decoded: String = out
            .tokens
            .iter()
            .zip(&out.masks)
            .filter(|(_, m)| **m != MASKED)
            .map(|(&t, _)| char::from_u32(t).unwrap())
            .collect();
        assert_eq!(decoded, "the answer<|im_end|>\n");
        assert_eq!(out.unmasked(), decoded.chars().count());
    }

    #[test]
    fn test_prompt_only_conversation_fully_masked() {
        let out =
            tokenize_for_trainer(&CharCodec, ChatTemplate::Llama3, &conversation()[..2]).unwrap();
        assert_eq!(out.unmasked(), 0);
    }

    #[test]
    fn test_template_serde() {
        let t: ChatTemplate = serde_json::from_str("\"chatml\"").unwrap();
        assert_eq!(t, ChatTemplate::ChatMl);
        assert_eq!(ChatTemplate::default(), ChatTemplate::Llama3);
    }
}
