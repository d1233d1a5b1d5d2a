/// One blamed line: the commit that last touched it and that commit's author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorship {
    pub commit: String,
    pub author: String,
}

/// Blame for a single line, as used by line investigations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBlame {
    pub commit: String,
    pub author_name: Option<String>,
    pub author_mail: Option<String>,
    pub summary: Option<String>,
}

#[derive(Default)]
struct Record {
    commit: Option<String>,
    author_name: Option<String>,
    author_mail: Option<String>,
    summary: Option<String>,
}

impl Record {
    fn author(&self) -> Option<&str> {
        self.author_mail
            .as_deref()
            .filter(|mail| !mail.is_empty())
            .or(self.author_name.as_deref().filter(|name| !name.is_empty()))
    }
}

fn is_commit_header(line: &str) -> Option<&str> {
    let sha = line.split(' ').next()?;
    (sha.len() >= 40 && sha.bytes().all(|b| b.is_ascii_hexdigit())).then_some(sha)
}

fn is_uncommitted(sha: &str) -> bool {
    sha.bytes().all(|b| b == b'0')
}

fn strip_mail(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Walks porcelain output and yields one [`Record`] per blamed line.
fn records(raw: &str) -> Vec<Record> {
    let mut out = Vec::new();
    let mut current = Record::default();

    for line in raw.lines() {
        if line.starts_with('\t') {
            out.push(std::mem::take(&mut current));
            continue;
        }
        if let Some(sha) = is_commit_header(line) {
            current = Record {
                commit: Some(sha.to_string()),
                ..Record::default()
            };
            continue;
        }
        if let Some(mail) = line.strip_prefix("author-mail ") {
            current.author_mail = Some(strip_mail(mail));
        } else if let Some(name) = line.strip_prefix("author ") {
            current.author_name = Some(name.trim().to_string());
        } else if let Some(summary) = line.strip_prefix("summary ") {
            current.summary = Some(summary.trim().to_string());
        }
    }
    out
}

/// Parses `git blame --line-porcelain` output into one entry per line.
///
/// Lines owned by the all-zero "not committed yet" revision and lines without any
/// author information are skipped.
pub fn parse_line_porcelain(raw: &str) -> Vec<Authorship> {
    records(raw)
        .into_iter()
        .filter_map(|record| {
            let commit = record.commit.as_deref()?;
            if is_uncommitted(commit) {
                return None;
            }
            Some(Authorship {
                commit: commit.to_string(),
                author: record.author()?.to_string(),
            })
        })
        .collect()
}

/// Parses `git blame -L n,n --porcelain` output for a single line.
pub fn parse_single_line_blame(raw: &str) -> Option<LineBlame> {
    let record = records(raw).into_iter().next()?;
    Some(LineBlame {
        commit: record.commit?,
        author_name: record.author_name,
        author_mail: record.author_mail.filter(|mail| !mail.is_empty()),
        summary: record.summary,
    })
}
