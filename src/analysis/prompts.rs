//! Prompt templates for every analysis flavor.
//!
//! One truncation limit applies to all inline payloads (`Config.analysis`);
//! earlier revisions of these flows had drifted to four different limits.

use crate::analysis::fetch::FileSample;
use crate::llm::CompletionRequest;
use crate::queue::jobs::{DocType, ScanType};

pub const SYSTEM_ENGINEER: &str = "You are a senior software engineer and technical architect. Analyze code and technical documentation clearly and practically.";
pub const SYSTEM_SECURITY: &str = "You are a senior application security engineer. Identify real vulnerabilities with practical fixes.";
pub const SYSTEM_DEVSECOPS: &str = "You are a DevSecOps engineer. Find real security issues in code.";
pub const SYSTEM_THERAPIST: &str = "You are a compassionate code therapist. You turn anxiety into understanding.";

/// Cut `text` to at most `limit` characters, respecting char boundaries.
pub fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn document_template(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Github => {
            "Analyze this CODEBASE for a {level} audience. Focus on:
1. PURPOSE: What does this codebase do? (High-level summary)
2. ARCHITECTURE: Key components and how they connect
3. TECH STACK: Languages, frameworks, dependencies
4. COMPLEXITY: Areas that need attention
5. ONBOARDING: What a new developer needs to know

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Api => {
            "Analyze this API documentation/code for a {level} audience. Focus on:
1. PURPOSE: What does this API do?
2. ENDPOINTS: Key operations and their purpose
3. AUTH: How authentication works
4. DATA FORMATS: Request/response structure
5. USAGE: Common implementation patterns

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Legacy => {
            "Analyze this LEGACY CODE for a {level} audience. Focus on:
1. PURPOSE: What was this code intended to do?
2. MODERNIZATION: How to approach rewriting
3. TECHNICAL DEBT: Specific problems to address
4. DEPENDENCIES: What it relies on
5. RISKS: Potential issues when modifying

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Security => {
            "Perform a SECURITY REVIEW of this code for a {level} audience. Focus on:
1. VULNERABILITIES: Specific security issues found
2. INPUT VALIDATION: How user input is handled
3. AUTH/PERMISSIONS: Access control concerns
4. SECURE CODING: Best practices to implement
5. PRIORITY: What to fix immediately

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Dependency => {
            "Analyze these DEPENDENCIES for a {level} audience. Focus on:
1. PURPOSE: Why each major dependency is used
2. VERSIONS: Outdated or vulnerable packages
3. ALTERNATIVES: Modern replacement options
4. CONFLICTS: Potential version conflicts
5. SIZE: Impact on bundle/project size

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Functions => {
            "Analyze this FUNCTION/CODE for a {level} audience. Focus on:
1. PURPOSE: Input to output transformation
2. COMPLEXITY: Cyclomatic complexity, nesting depth
3. EDGE CASES: Missing error handling
4. PERFORMANCE: Potential bottlenecks
5. REFACTORING: How to improve readability

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Config => {
            "Analyze this CONFIGURATION for a {level} audience. Focus on:
1. SYSTEM: What this configures (deployment, CI/CD, app settings)
2. KEY SETTINGS: Critical parameters and their effects
3. SECURITY: Exposed secrets, permissions issues
4. OPTIMIZATION: Recommended changes
5. ENVIRONMENT: Dev vs prod differences

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Documentation => {
            "Analyze this TECHNICAL DOCUMENTATION for a {level} audience. Focus on:
1. TOPIC: What this document describes
2. CLARITY: Well-explained vs confusing sections
3. COMPLETENESS: What's missing or outdated
4. EXAMPLES: Quality of code examples
5. IMPLEMENTATION: How to use this documentation

Keep analysis under 500 words. Use bullet points. No markdown."
        }
        DocType::Peace | DocType::Other => {
            "Analyze this TECHNICAL CONTENT for a {level} audience. Provide:
1. Clear summary of what this does
2. Key technical concepts explained simply
3. Actionable insights or recommendations

Keep analysis under 500 words. Use bullet points. No markdown."
        }
    }
}

pub fn document_prompt(
    doc_type: DocType,
    level: &str,
    text: &str,
    questions: &str,
) -> CompletionRequest {
    if doc_type == DocType::Peace {
        return peace_prompt(text, questions);
    }

    let mut prompt = document_template(doc_type).replace("{level}", level);
    if !questions.is_empty() {
        prompt.push_str(&format!("\n\nUSER-SPECIFIC QUESTIONS:\n{questions}"));
    }
    prompt.push_str(&format!("\n\nCONTENT TO ANALYZE:\n{text}"));

    CompletionRequest::new(SYSTEM_ENGINEER, prompt).with_temperature(0.3)
}

/// Peace-of-mind report for the code-anxiety flow. `context` is the user's
/// own description of how they feel about the code.
pub fn peace_prompt(text: &str, context: &str) -> CompletionRequest {
    let prompt = format!(
        "USER'S EMOTIONAL STATE: {context}

FILES TO ANALYZE:
{text}

---
CREATE A PEACE-OF-MIND REPORT:

1. ONE-SENTENCE SUMMARY
[What this code DOES in plain English]

2. THE LAYOUT (Don't overwhelm me)
[Just the 3-5 most important files/folders and what they do]

3. MAIN CONNECTIONS
[How the important parts talk to each other, like a simple story]

4. 3 IMMEDIATE CONCERNS
[Most urgent issues in simple terms]

5. SECURITY CHECK
[Any obvious security issues? Keep it simple]

6. GET IT RUNNING
[Copy-paste commands to make it work]

7. THE 10-YEAR-OLD EXPLANATION
[Use an analogy. Make it comforting]

8. YOUR FIRST 10 MINUTES
[One small, achievable task to build confidence]"
    );

    CompletionRequest::new(SYSTEM_THERAPIST, prompt).with_temperature(0.3)
}

pub fn repository_prompt(
    repo_url: &str,
    branch: &str,
    level: &str,
    questions: &str,
    files: &[FileSample],
) -> CompletionRequest {
    let file_context = files
        .iter()
        .take(15)
        .map(|f| format!("File: {}\n{}...", f.path, truncate(&f.content, 1000)))
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!(
        "Analyze this GitHub repository for a {level} audience.

Repository: {repo_url}
Branch: {branch}
Files analyzed: {} key files

Please provide:
1. PROJECT OVERVIEW: What does this codebase do?
2. TECH STACK: Languages, frameworks, key dependencies
3. ARCHITECTURE: Main components and how they connect
4. COMPLEXITY: Areas that need attention
5. ONBOARDING: What a new developer needs to know

{questions}

FILE SAMPLES:
{file_context}

Keep analysis under 800 words. Use bullet points.",
        files.len()
    );

    CompletionRequest::new(SYSTEM_ENGINEER, prompt).with_temperature(0.3)
}

fn security_template(scan_type: ScanType) -> &'static str {
    match scan_type {
        ScanType::Full => {
            "Perform a comprehensive security audit of this code. Focus on:
1. HARDCODED SECRETS: API keys, passwords, tokens, credentials
2. INJECTION VULNERABILITIES: SQL, NoSQL, command injection
3. AUTHENTICATION ISSUES: Weak password handling, session management
4. INPUT VALIDATION: Missing sanitization, unsafe deserialization
5. DEPENDENCY RISKS: Outdated or vulnerable libraries
6. CRYPTOGRAPHY: Weak algorithms, improper implementation
7. ERROR HANDLING: Information disclosure in error messages
8. ACCESS CONTROL: Missing permission checks

For each finding, include:
- SEVERITY: Critical/High/Medium/Low
- LOCATION: Line number or code snippet
- DESCRIPTION: What's the issue?
- FIX: How to remediate

Threshold: Show {threshold} severity and above."
        }
        ScanType::Secrets => {
            "Scan this code for HARDCODED SECRETS and SENSITIVE DATA:
- API keys, tokens, passwords
- AWS/GCP/Azure credentials
- Database connection strings
- Private keys (RSA, SSH)
- JWT secrets, OAuth tokens
- Encryption keys

Report each finding with severity and remediation."
        }
        ScanType::Dependencies => {
            "Analyze dependencies for SECURITY VULNERABILITIES:
- Outdated packages with known CVEs
- Deprecated or unmaintained libraries
- Version conflicts with security implications
- Risky import patterns

Focus on high and critical severity issues."
        }
    }
}

pub fn security_code_prompt(
    scan_type: ScanType,
    threshold: &str,
    questions: &str,
    code: &str,
) -> CompletionRequest {
    let mut prompt = security_template(scan_type).replace("{threshold}", threshold);
    if !questions.is_empty() {
        prompt.push_str(&format!("\n\nSPECIFIC QUESTIONS:\n{questions}"));
    }
    prompt.push_str(&format!("\n\nCODE TO ANALYZE:\n```\n{code}\n```"));

    CompletionRequest::new(SYSTEM_SECURITY, prompt).with_temperature(0.2)
}

pub fn security_repo_prompt(
    repo_url: &str,
    branch: &str,
    scan_type: ScanType,
    threshold: &str,
    questions: &str,
    files: &[FileSample],
) -> CompletionRequest {
    let file_samples = files
        .iter()
        .take(10)
        .map(|f| format!("File: {}\n{}...", f.path, truncate(&f.content, 800)))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Perform a security audit of this GitHub repository.

Repository: {repo_url}
Branch: {branch}
Scan Type: {}
Severity Threshold: {threshold}

FILES ANALYZED:
{file_samples}

Focus on:
1. Hardcoded secrets and credentials
2. Security misconfigurations
3. Vulnerable code patterns
4. Dependency issues (if package files found)
5. Exposure of sensitive information

For each finding, include severity and remediation.

{questions}",
        scan_type.name()
    );

    CompletionRequest::new(SYSTEM_DEVSECOPS, prompt).with_temperature(0.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // multibyte: must not panic or split a char
        assert_eq!(truncate("héllo", 2), "hé");
    }

    #[test]
    fn test_document_prompt_includes_level_and_questions() {
        let req = document_prompt(
            DocType::Functions,
            "beginner",
            "def f(): pass",
            "is this safe?",
        );
        assert!(req.prompt.contains("for a beginner audience"));
        assert!(req.prompt.contains("USER-SPECIFIC QUESTIONS:\nis this safe?"));
        assert!(req.prompt.contains("CONTENT TO ANALYZE:\ndef f(): pass"));
        assert_eq!(req.system, SYSTEM_ENGINEER);
    }

    #[test]
    fn test_unknown_doc_type_gets_generic_template() {
        let req = document_prompt(DocType::Other, "expert", "text", "");
        assert!(req.prompt.contains("TECHNICAL CONTENT"));
        assert!(!req.prompt.contains("USER-SPECIFIC QUESTIONS"));
    }

    #[test]
    fn test_peace_prompt_carries_user_context() {
        let req = document_prompt(DocType::Peace, "beginner", "main.py: print(1)", "I inherited this");
        assert!(req.prompt.contains("USER'S EMOTIONAL STATE: I inherited this"));
        assert!(req.prompt.contains("PEACE-OF-MIND REPORT"));
        assert_eq!(req.system, SYSTEM_THERAPIST);
    }

    #[test]
    fn test_security_prompt_threshold_substitution() {
        let req = security_code_prompt(ScanType::Full, "high", "", "eval(input())");
        assert!(req.prompt.contains("Show high severity and above"));
        assert!(req.prompt.contains("eval(input())"));
        assert_eq!(req.temperature, 0.2);
    }

    #[test]
    fn test_repository_prompt_caps_file_samples() {
        let files: Vec<FileSample> = (0..20)
            .map(|i| FileSample {
                path: format!("src/file{i}.rs"),
                content: "fn main() {}".to_string(),
                size: 12,
                is_secret: false,
            })
            .collect();
        let req = repository_prompt("https://github.com/a/b", "main", "professional", "", &files);
        assert!(req.prompt.contains("Files analyzed: 20 key files"));
        assert!(req.prompt.contains("src/file14.rs"));
        assert!(!req.prompt.contains("src/file15.rs"));
    }
}
