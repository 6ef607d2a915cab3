//! Terminal progress for the generation loop.

use std::io::{BufRead, IsTerminal, Write};

use clap::ValueEnum;
use kiln_core::generate::ErrorKind;
use kiln_core::{FatalDecision, LoopCallback, PassFailure};

use crate::colors;

/// What to do when dependency failures outlast the grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FatalPolicy {
    /// Ask on a terminal, abort otherwise.
    #[default]
    Ask,
    Abort,
    Continue,
    /// Abort and ask the service to explain the failure.
    Diagnose,
}

/// Progress callback that prints pass status to the terminal.
pub struct ProgressCallback {
    policy: FatalPolicy,
}

impl ProgressCallback {
    pub fn new(policy: FatalPolicy) -> Self {
        Self { policy }
    }

    fn ask(&self) -> FatalDecision {
        if !std::io::stdin().is_terminal() {
            return FatalDecision::Abort;
        }

        print!(
            "  {}Missing dependencies keep failing the build.{} [a]bort, [c]ontinue, [d]iagnose and abort? ",
            colors::YELLOW,
            colors::RESET
        );
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return FatalDecision::Abort;
        }
        parse_answer(&answer)
    }
}

fn parse_answer(answer: &str) -> FatalDecision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "c" | "continue" => FatalDecision::Continue,
        "d" | "diagnose" => FatalDecision::AbortWithDiagnosis,
        _ => FatalDecision::Abort,
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::DependencyFatal => "missing dependency",
        ErrorKind::LazyTranslation => "foreign runtime wrapper",
        ErrorKind::GenericBuildError => "build error",
    }
}

impl LoopCallback for ProgressCallback {
    fn on_pass_started(&self, pass: u32, max_passes: u32) {
        print!(
            "{}  ▶ Pass{} {}/{} ... ",
            colors::CYAN,
            colors::RESET,
            pass,
            max_passes
        );
        colors::flush_stdout();
    }

    fn on_pass_failed(&self, _pass: u32, failure: &PassFailure) {
        println!("{}✗{}", colors::RED, colors::RESET);
        match failure {
            PassFailure::Transport(e) => {
                eprintln!("{}    No response:{} {}", colors::RED, colors::RESET, e);
            }
            PassFailure::Extraction(e) => {
                eprintln!("{}    Unusable response:{} {}", colors::YELLOW, colors::RESET, e);
            }
            PassFailure::Build {
                kind,
                excerpt,
                exit_code,
            } => {
                eprintln!(
                    "{}    {}{} (exit {})",
                    colors::RED,
                    kind_label(*kind),
                    colors::RESET,
                    exit_code
                );
                for line in excerpt.lines() {
                    eprintln!("{}      {}{}", colors::DIM, line, colors::RESET);
                }
            }
        }
    }

    fn on_verified(&self, _pass: u32) {
        println!("{}✓{}", colors::GREEN, colors::RESET);
    }

    fn on_dependency_fatal(&self, _pass: u32, _excerpt: &str) -> FatalDecision {
        match self.policy {
            FatalPolicy::Ask => self.ask(),
            FatalPolicy::Abort => FatalDecision::Abort,
            FatalPolicy::Continue => FatalDecision::Continue,
            FatalPolicy::Diagnose => FatalDecision::AbortWithDiagnosis,
        }
    }

    fn on_diagnosis(&self, text: &str) {
        println!("\n{}Diagnosis:{}", colors::BOLD, colors::RESET);
        for line in text.lines() {
            println!("  {line}");
        }
    }

    fn on_file_started(&self, index: usize, total: usize, filename: &str) {
        println!(
            "{}  ◆ [{}/{}]{} {}{}{}",
            colors::BLUE,
            index,
            total,
            colors::RESET,
            colors::BOLD,
            filename,
            colors::RESET
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("c\n"), FatalDecision::Continue);
        assert_eq!(parse_answer(" Diagnose "), FatalDecision::AbortWithDiagnosis);
        assert_eq!(parse_answer("\n"), FatalDecision::Abort);
        assert_eq!(parse_answer("whatever"), FatalDecision::Abort);
    }

    #[test]
    fn test_fixed_policies() {
        assert_eq!(
            ProgressCallback::new(FatalPolicy::Continue).on_dependency_fatal(3, ""),
            FatalDecision::Continue
        );
        assert_eq!(
            ProgressCallback::new(FatalPolicy::Diagnose).on_dependency_fatal(3, ""),
            FatalDecision::AbortWithDiagnosis
        );
    }
}
