//! README prompt assembly.

use crate::constants::END_MARK;
use crate::github::RepoSnapshot;

/// Build the trimmed file context block: one fenced section per file.
pub fn build_context(snapshot: &RepoSnapshot) -> String {
    snapshot
        .files
        .iter()
        .map(|f| format!("# {}\n```\n{}\n```", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the initial generation prompt from repo metadata and context.
pub fn build_readme_prompt(snapshot: &RepoSnapshot, context: &str) -> String {
    format!(
        "Generate a concise, well-structured README.md for this repo.\n\
         \n\
         ### Must Include\n\
         - Project title + 1–2 line tagline\n\
         - Short overview\n\
         - Features (bulleted)\n\
         - Tech stack (detect from code)\n\
         - Quickstart (install, run, test)\n\
         - Configuration / Env vars\n\
         - License\n\
         - End with {end}\n\
         \n\
         ### Rules\n\
         - Use clean Markdown.\n\
         - Be realistic — use real commands from files.\n\
         - Add TODO if something is missing.\n\
         - Keep it brief and developer-friendly.\n\
         - No extra commentary outside the README.\n\
         \n\
         Repo: {repo}\n\
         Branch: {branch}\n\
         Description: {description}\n\
         \n\
         ### Context\n\
         ```\n\
         {context}\n\
         ```\n\
         \n\
         Return only the README content and end with {end}.",
        end = END_MARK,
        repo = snapshot.id.pretty(),
        branch = snapshot.default_branch,
        description = snapshot.description.as_deref().unwrap_or("(none)"),
        context = context,
    )
}
