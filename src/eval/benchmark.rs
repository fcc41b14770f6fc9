// ============================================================
// Layer 5 — Benchmarks
// ============================================================
// Ties the matcher, a judger and an aggregator together for one
// benchmark task.
//
//   POPE     — "Is there a <object> in the image?"
//              field `answer` is "yes" / "no"
//              judged by yes_no, scored into ConfusionCounts
//              tasks: adversarial, popular, random
//
//   A-OKVQA  — multiple choice over `choices`, the right one at
//              `correct_choice_idx`
//              correct if strict_choice OR loose_answer
//              scored into MatchCounts
//
// evaluate() walks the matched pairs in item order, pushes one
// DetailRecord per pair into the sink and returns the task score
// with the number of pairs scored.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::template::ChatTemplate;
use crate::domain::error::PipelineError;
use crate::domain::inference::{GenerationRequest, InferenceOutput, SamplingConfig};
use crate::domain::record::RawRecord;
use crate::domain::traits::GenerationEngine;
use crate::eval::judge::{choice_letter, first_isolated_capital, loose_answer, strict_choice, yes_no, YesNo};
use crate::eval::matcher::match_outputs;
use crate::eval::scoring::{ConfusionCounts, MatchCounts, TaskScore};
use crate::eval::sink::{DetailRecord, DetailSink};

const POPE_TASKS: [&str; 3] = ["adversarial", "popular", "random"];
const AOKVQA_TASKS: [&str; 1] = ["validation"];

/// Placeholder the engine leaves in prompts where an image went.
const IMAGE_TOKEN: &str = "<image>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Benchmark {
    Pope,
    AOkvqa,
}

/// One judged pair, before it is counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub detail: DetailRecord,
    /// Set for yes/no benchmarks only
    pub binary: Option<(YesNo, YesNo)>,
}

impl Benchmark {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pope   => "POPE",
            Self::AOkvqa => "A-OKVQA",
        }
    }

    pub fn default_tasks(&self) -> &'static [&'static str] {
        match self {
            Self::Pope   => &POPE_TASKS,
            Self::AOkvqa => &AOKVQA_TASKS,
        }
    }

    /// Number of tasks a full run of this benchmark scores.
    pub fn declared_tasks(&self) -> usize {
        self.default_tasks().len()
    }

    fn empty_score(&self) -> TaskScore {
        match self {
            Self::Pope   => TaskScore::Binary(ConfusionCounts::default()),
            Self::AOkvqa => TaskScore::Match(MatchCounts::default()),
        }
    }

    /// The question as shown to the model, before chat formatting.
    pub fn question_text(&self, item: &RawRecord) -> Result<String, PipelineError> {
        let question = item.str_field("question")?;
        match self {
            Self::Pope => Ok(question.to_string()),
            Self::AOkvqa => {
                let mut text = question.to_string();
                for (i, choice) in item.str_list_field("choices")?.iter().enumerate() {
                    let letter = choice_letter(i)
                        .ok_or_else(|| PipelineError::invalid("choices", "more than 26 choices"))?;
                    text.push_str(&format!("\n{letter}. {choice}"));
                }
                text.push_str("\nAnswer with the option's letter from the given choices directly.");
                Ok(text)
            }
        }
    }

    /// Judge one matched pair.
    pub fn judge(&self, item: &RawRecord, output: &InferenceOutput) -> Result<Judgement, PipelineError> {
        let question = item.str_field("question")?.to_string();
        let response = output.primary_response().to_string();
        let prompt   = output.prompt_text.clone();

        match self {
            Self::Pope => {
                let expected   = item.str_field("answer")?.to_lowercase();
                let label      = YesNo::from_answer(&expected);
                let prediction = yes_no(&response);
                Ok(Judgement {
                    detail: DetailRecord {
                        question,
                        prompt,
                        expected,
                        response,
                        prediction: prediction.to_string(),
                        correct:    prediction == label,
                    },
                    binary: Some((prediction, label)),
                })
            }
            Self::AOkvqa => {
                let idx = item.u64_field("correct_choice_idx")? as usize;
                let choices = item.str_list_field("choices")?;
                let expected_text = choices.get(idx).ok_or_else(|| {
                    PipelineError::invalid(
                        "correct_choice_idx",
                        format!("index {idx} out of range for {} choices", choices.len()),
                    )
                })?;
                let letter = choice_letter(idx).ok_or_else(|| {
                    PipelineError::invalid("correct_choice_idx", format!("index {idx} has no letter"))
                })?;

                let correct = strict_choice(letter, &response) || loose_answer(expected_text, &response);
                let prediction = first_isolated_capital(&response)
                    .map(String::from)
                    .unwrap_or_default();

                Ok(Judgement {
                    detail: DetailRecord {
                        question,
                        prompt,
                        expected: letter.to_string(),
                        response,
                        prediction,
                        correct,
                    },
                    binary: None,
                })
            }
        }
    }
}

impl std::fmt::Display for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Scoring one task ─────────────────────────────────────────────────────────
/// Score `outputs` against `items` for one task.
/// Returns the task score and the number of pairs scored.
pub fn evaluate(
    benchmark: Benchmark,
    items:     &[RawRecord],
    outputs:   &[InferenceOutput],
    sink:      &mut dyn DetailSink,
) -> Result<(TaskScore, usize)> {
    let mut score = benchmark.empty_score();
    let mut total_scored = 0;

    for (item, output) in match_outputs(items, outputs) {
        let judgement = benchmark
            .judge(item, output)
            .with_context(|| format!("Cannot judge {benchmark} item {}", output.question_id))?;

        match (&mut score, judgement.binary) {
            (TaskScore::Binary(counts), Some((prediction, label))) => counts.record(prediction, label),
            (TaskScore::Match(counts), _) => counts.record(judgement.detail.correct),
            (TaskScore::Binary(_), None) => bail!("{benchmark} judgement carried no yes/no label"),
        }

        sink.record(judgement.detail)?;
        total_scored += 1;
    }

    sink.finish()?;
    Ok((score, total_scored))
}

// ─── Generating outputs ───────────────────────────────────────────────────────
/// Run every item through `engine` and tag each generation with
/// its item's question_id. Image placeholders are stripped from
/// the stored prompt.
pub fn generate_outputs(
    benchmark: Benchmark,
    engine:    &dyn GenerationEngine,
    items:     &[RawRecord],
    chat:      &ChatTemplate,
    sampling:  &SamplingConfig,
) -> Result<Vec<InferenceOutput>> {
    let requests = items
        .iter()
        .map(|item| -> Result<GenerationRequest> {
            Ok(GenerationRequest {
                question_id:   item.question_id()?,
                prompt:        chat.render(&benchmark.question_text(item)?),
                modality_file: item.str_field("image").ok().map(String::from),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let generations = engine.generate(&requests, sampling)?;
    if generations.len() != requests.len() {
        bail!(
            "Engine returned {} generation(s) for {} request(s)",
            generations.len(),
            requests.len()
        );
    }

    Ok(requests
        .into_iter()
        .zip(generations)
        .map(|(request, mut generation)| {
            generation.prompt = generation.prompt.replace(IMAGE_TOKEN, "");
            InferenceOutput::from_generation(request.question_id, generation)
        })
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inference::RawGeneration;
    use serde_json::json;

    fn pope_item(id: &str, answer: &str) -> RawRecord {
        RawRecord::from_value(json!({
            "question_id": id,
            "question": "Is there a dog in the image?",
            "answer": answer,
        }))
    }

    fn okvqa_item(id: u64, correct: u64) -> RawRecord {
        RawRecord::from_value(json!({
            "question_id": id,
            "question": "What animal is this?",
            "choices": ["cat", "red fox", "horse", "owl"],
            "correct_choice_idx": correct,
        }))
    }

    #[test]
    fn test_duplicate_question_scored_once() {
        let items   = vec![pope_item("Q1", "yes")];
        let outputs = vec![
            InferenceOutput::new("Q1", "Yes, there is."),
            InferenceOutput::new("Q1", "No."),
        ];
        let mut details: Vec<DetailRecord> = Vec::new();

        let (score, total) = evaluate(Benchmark::Pope, &items, &outputs, &mut details).unwrap();

        assert_eq!(total, 1);
        assert_eq!(details.len(), 1);
        assert_eq!(score, TaskScore::Binary(ConfusionCounts { tp: 1, ..Default::default() }));
    }

    #[test]
    fn test_pope_counts_add_up_to_total() {
        let items = vec![
            pope_item("1", "yes"),
            pope_item("2", "no"),
            pope_item("3", "no"),
            pope_item("4", "yes"),
            pope_item("5", "yes"),
        ];
        let outputs = vec![
            InferenceOutput::new("1", "Yes"),
            InferenceOutput::new("2", "Yes there is"),
            InferenceOutput::new("3", "No, there is not"),
            InferenceOutput::new("4", "There is no dog"),
        ];
        let mut details: Vec<DetailRecord> = Vec::new();

        let (score, total) = evaluate(Benchmark::Pope, &items, &outputs, &mut details).unwrap();

        let TaskScore::Binary(counts) = score else { panic!("expected binary score") };
        assert_eq!(total, 4);
        assert_eq!(counts.total(), total);
        assert_eq!(counts, ConfusionCounts { tp: 1, fp: 1, tn: 1, fn_: 1 });
        assert_eq!(details[3].prediction, "no");
        assert!(!details[3].correct);
    }

    #[test]
    fn test_aokvqa_strict_or_loose() {
        let items = vec![okvqa_item(1, 1), okvqa_item(2, 1), okvqa_item(3, 1)];
        let outputs = vec![
            InferenceOutput::new(1u64, "B"),
            InferenceOutput::new(2u64, "It looks like a red fox"),
            InferenceOutput::new(3u64, "C"),
        ];
        let mut details: Vec<DetailRecord> = Vec::new();

        let (score, total) = evaluate(Benchmark::AOkvqa, &items, &outputs, &mut details).unwrap();

        assert_eq!(total, 3);
        assert_eq!(score, TaskScore::Match(MatchCounts { matches: 2, total: 3 }));
        assert_eq!(details[0].expected, "B");
        assert_eq!(details[2].prediction, "C");
    }

    #[test]
    fn test_aokvqa_index_out_of_range_is_an_error() {
        let items   = vec![okvqa_item(1, 9)];
        let outputs = vec![InferenceOutput::new(1u64, "A")];
        let mut details: Vec<DetailRecord> = Vec::new();

        assert!(evaluate(Benchmark::AOkvqa, &items, &outputs, &mut details).is_err());
    }

    #[test]
    fn test_no_matches_scores_zero() {
        let items = vec![pope_item("1", "yes")];
        let mut details: Vec<DetailRecord> = Vec::new();

        let (score, total) = evaluate(Benchmark::Pope, &items, &[], &mut details).unwrap();
        assert_eq!(total, 0);
        assert_eq!(score.accuracy(), 0.0);
    }

    #[test]
    fn test_question_text_lists_choices() {
        let text = Benchmark::AOkvqa.question_text(&okvqa_item(1, 0)).unwrap();
        assert!(text.starts_with("What animal is this?\nA. cat\nB. red fox"));
        assert!(text.contains("D. owl"));
    }

    #[test]
    fn test_declared_tasks() {
        assert_eq!(Benchmark::Pope.declared_tasks(), 3);
        assert_eq!(Benchmark::AOkvqa.declared_tasks(), 1);
    }

    struct EchoEngine;

    impl GenerationEngine for EchoEngine {
        fn generate(
            &self,
            requests: &[GenerationRequest],
            _sampling: &SamplingConfig,
        ) -> Result<Vec<RawGeneration>> {
            Ok(requests
                .iter()
                .map(|r| RawGeneration {
                    texts:    vec!["yes".into()],
                    prompt:   format!("{IMAGE_TOKEN}{}", r.prompt),
                    metadata: serde_json::Value::Null,
                })
                .collect())
        }
    }

    #[test]
    fn test_generate_outputs_tags_ids_and_strips_image_token() {
        let items = vec![pope_item("Q7", "yes")];
        let outputs = generate_outputs(
            Benchmark::Pope,
            &EchoEngine,
            &items,
            &ChatTemplate::default(),
            &SamplingConfig::default(),
        )
        .unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].question_id.as_str(), "Q7");
        assert_eq!(outputs[0].prompt_text, "USER: Is there a dog in the image? ASSISTANT:");
    }
}
