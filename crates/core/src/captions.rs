//! Word-by-word ASS caption generation.
//!
//! Captions show one word at a time, bottom centre. Without a speech
//! aligner, each word's on-screen time is its share of the voiceover
//! duration, weighted by word length.

use std::fmt::Write as _;

/// A single caption event.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionWord {
    pub text: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Minimum weight for a word, so one-letter words still get visible time.
const MIN_WORD_WEIGHT: usize = 3;

const ASS_HEADER: &str = "[Script Info]\n\
Title: Video Captions\n\
ScriptType: v4.00+\n\
PlayResX: 1920\n\
PlayResY: 1080\n\
\n\
[V4+ Styles]\n\
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
Style: Word,Arial,72,&H00FFFFFF,&H00FFFFFF,&H00000000,&H80000000,1,0,0,0,100,100,0,0,1,4,2,2,10,10,60,1\n\
\n\
[Events]\n\
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n";

/// Split `script` into words and spread them over `duration_secs`.
///
/// Consecutive words never overlap: each ends exactly where the next
/// starts, and the last ends at `duration_secs`.
pub fn time_words(script: &str, duration_secs: f64) -> Vec<CaptionWord> {
    let words: Vec<String> = script
        .split_whitespace()
        .map(sanitize_word)
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || duration_secs <= 0.0 {
        return Vec::new();
    }

    let weights: Vec<usize> = words
        .iter()
        .map(|w| w.chars().count().max(MIN_WORD_WEIGHT))
        .collect();
    let total: usize = weights.iter().sum();

    let mut elapsed = 0usize;
    let last = words.len() - 1;
    words
        .into_iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (text, weight))| {
            let start_secs = duration_secs * elapsed as f64 / total as f64;
            elapsed += weight;
            let end_secs = if i == last {
                duration_secs
            } else {
                duration_secs * elapsed as f64 / total as f64
            };
            CaptionWord {
                text,
                start_secs,
                end_secs,
            }
        })
        .collect()
}

/// Render caption events as a complete ASS document.
pub fn render_ass(words: &[CaptionWord]) -> String {
    let mut out = String::from(ASS_HEADER);
    for word in words {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},Word,,0,0,0,,{}",
            format_ass_timestamp(word.start_secs),
            format_ass_timestamp(word.end_secs),
            word.text
        );
    }
    out
}

/// Build the ASS document for a script spoken over `duration_secs`.
pub fn build_captions(script: &str, duration_secs: f64) -> String {
    render_ass(&time_words(script, duration_secs))
}

/// Format seconds as an ASS timestamp (`H:MM:SS.cc`).
pub fn format_ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs / 6_000) % 60;
    let secs = (total_cs / 100) % 60;
    let cs = total_cs % 100;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

/// Drop characters ASS treats as override-block delimiters.
fn sanitize_word(word: &str) -> String {
    word.chars().filter(|c| !matches!(c, '{' | '}' | '\\')).collect()
}
