//! Prompt construction.
//!
//! Order matters: role and rules first, then the user's own instructions
//! (which override the rules), then the material to work from, then what
//! went wrong last time.

use crate::context::{GenerationMode, RunContext};
use crate::preprocess::EXPORT_KEYWORD;
use crate::profile::LanguageProfile;

use super::history::ErrorHistory;

/// The material a prompt asks the service to work from.
#[derive(Debug, Clone, Copy)]
pub enum PromptSource<'a> {
    /// Generate from the aggregated input documents.
    Fresh { input: &'a str },
    /// Rework an existing artifact.
    Update { existing: &'a str },
    /// One file of a blueprint, with everything generated so far.
    BlueprintFile {
        filename: &'a str,
        specification: &'a str,
        project_memory: &'a str,
    },
}

fn preamble(mode: GenerationMode, profile: &LanguageProfile) -> String {
    let lang = &profile.display_name;
    match mode {
        GenerationMode::Transpile => format!(
            "You are a compiler that writes {lang}.\n\
             Rules:\n\
             - Produce ONE complete, self-contained {lang} program implementing everything described below.\n\
             - Translate the logic natively. Never embed, wrap or call another language's runtime or interpreter.\n\
             - Use only the standard library unless a dependency is explicitly requested.\n\
             - Reply with the source code only, inside a single fenced code block."
        ),
        GenerationMode::Architect => format!(
            "You are a software architect writing a multi-file {lang} project.\n\
             Rules:\n\
             - Emit every file of the project.\n\
             - Start each file with a line `{EXPORT_KEYWORD} \"relative/path.ext\"` and end it with `{EXPORT_KEYWORD} END`.\n\
             - Files must be complete; do not elide code with placeholders.\n\
             - Put nothing outside the export blocks except brief notes."
        ),
        GenerationMode::Asset => format!(
            "You generate {lang} assets.\n\
             Rules:\n\
             - Produce exactly the asset described below, complete and valid {lang}.\n\
             - Reply with the content only, inside a single fenced code block."
        ),
    }
}

fn project_file_preamble(profile: &LanguageProfile) -> String {
    format!(
        "You are writing one file of a multi-file {lang} project.\n\
         Rules:\n\
         - Write the complete file named below and nothing else.\n\
         - Use the declarations of the files already written; do not redefine them.\n\
         - Reply with the file content only, inside a single fenced code block.",
        lang = profile.display_name
    )
}

/// Build the prompt for one pass.
pub fn build_prompt(
    ctx: &RunContext,
    profile: &LanguageProfile,
    source: PromptSource<'_>,
    history: &ErrorHistory,
) -> String {
    let mut prompt = match source {
        PromptSource::BlueprintFile { .. } => project_file_preamble(profile),
        _ => preamble(ctx.mode, profile),
    };
    prompt.push_str("\n\n");

    if let Some(instructions) = ctx.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str("USER INSTRUCTIONS (highest priority, follow them even over the rules above):\n");
        prompt.push_str(instructions.trim());
        prompt.push_str("\n\n");
    }

    match source {
        PromptSource::Fresh { input } => {
            prompt.push_str("SOURCE DOCUMENTS:\n");
            prompt.push_str(input);
        }
        PromptSource::Update { existing } => {
            prompt.push_str(&format!(
                "EXISTING {} ARTIFACT (modify it, keep what already works, return the whole file):\n",
                profile.display_name
            ));
            prompt.push_str(existing);
        }
        PromptSource::BlueprintFile {
            filename,
            specification,
            project_memory,
        } => {
            if !project_memory.trim().is_empty() {
                prompt.push_str("FILES ALREADY WRITTEN (stay consistent with them):\n");
                prompt.push_str(project_memory);
                prompt.push_str("\n\n");
            }
            prompt.push_str(&format!("WRITE ONLY THE FILE `{filename}`. Its specification:\n"));
            prompt.push_str(specification);
        }
    }

    if !history.is_empty() {
        prompt.push_str("\n\nPREVIOUS ATTEMPTS FAILED. Fix these problems:\n");
        prompt.push_str(&history.render());
    }

    prompt
}

/// One-shot request for a plain-language diagnosis of a dependency failure.
pub fn diagnosis_prompt(profile: &LanguageProfile, build_output: &str) -> String {
    format!(
        "A {} build keeps failing because something it depends on is missing.\n\
         Explain in a few sentences which dependency is missing and how to install or replace it.\n\
         Do not write code.\n\nBUILD OUTPUT:\n{}",
        profile.display_name,
        build_output.trim()
    )
}
