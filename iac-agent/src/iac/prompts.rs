//! Prompt templates for the gate, generation and fix nodes

use crate::iac::types::FileSet;

/// System prompt sent with every generative call
pub const SYSTEM_PROMPT: &str =
    "You are an Infrastructure-as-Code assistant that writes production-quality Terraform.";

/// Build the requirements admission prompt
pub fn requirements_gate_prompt(requirement_text: &str) -> String {
    format!(
        r#"You are validating user requirements for Terraform automation. Be lenient.

If information is missing but has a sensible real default, treat the requirements as VALID.
Answer NOT_VALID only when critical information is missing that has no safe default, or when
the requirements contradict each other (for example, conflicting cloud providers with no way
to choose between them).

Permitted defaults:
- AWS as the provider when none is named
- us-east-1 as the AWS region when none is named
- SSH, HTTP and HTTPS ingress in the default security group
- The standard AMI for the referenced operating system
- t3.micro as the instance type when none is named

Defaults must be concrete values Terraform accepts (a real CIDR such as "192.168.1.1/32",
never a placeholder such as "YOUR_IP/32").

Also flag obviously unsafe security requests.

Output format:
1. validation_result: exactly one of VALID or NOT_VALID
2. errors: bullet list of the critical missing or conflicting requirements when NOT_VALID,
   empty when VALID

Write the verdict token exactly once and do not mention the other token.

User requirements:
{requirement_text}"#
    )
}

/// Build the initial generation prompt
pub fn generation_prompt(requirement_text: &str, extension: &str, fence_lang: &str) -> String {
    format!(
        r#"Generate {extension} files for the validated requirements below.

Rules:
- Use only what the requirements describe, plus the documented defaults
- Do not invent modules, remote backends or variables nobody asked for
- Follow tagging, naming, environment and security conventions stated in the requirements

Output format:
- A short explanation of the infrastructure that will be created
- Every file as a heading with its filename followed by a fenced code block:

### main{extension}
```{fence_lang}
...
```

- No commentary inside code blocks

User requirements:
{requirement_text}"#
    )
}

/// Render the current file set as labeled, fenced blocks
pub fn format_files_for_prompt(files: &FileSet, fence_lang: &str) -> String {
    files
        .iter()
        .map(|file| format!("# {}\n```{}\n{}\n```", file.name, fence_lang, file.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the repair prompt from the latest diagnostics and files
pub fn fix_prompt(
    requirement_text: &str,
    validation_errors: &str,
    files: &FileSet,
    fence_lang: &str,
) -> String {
    let current_files = if files.is_empty() {
        "(no files were produced by the previous attempt)".to_string()
    } else {
        format_files_for_prompt(files, fence_lang)
    };

    format!(
        r#"Fix the validation errors in these Terraform files.

USER REQUIREMENTS:
{requirement_text}

VALIDATION ERRORS:
{validation_errors}

CURRENT FILES:
{current_files}

Use this format for each file:

# filename.tf
```{fence_lang}
[corrected code]
```

Fix ONLY the reported errors. Keep filenames and structure the same."#
    )
}
