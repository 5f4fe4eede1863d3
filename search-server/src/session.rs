//! Per-connection protocol state machine.

use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Instant;

use engine::{CorpusProvider, InvertedIndex};

/// One entry of a `search` response, remembered so a later `getsnippet <n>`
/// can resolve `n` back to a document without re-running the query.
///
/// `file_name` (the substring after the last `/` or `\`) is part of the
/// per-result record even though the wire format only ever prints `path`;
/// it mirrors the field the original session state keeps for display.
struct ResultEntry {
    path: String,
    file_name: String,
    match_count: usize,
    match_char_offsets: Vec<u64>,
}

fn base_name(path: &str) -> String {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
        .to_string()
}

/// Per-connection state: the last query string and the last search's
/// results, used to resolve `getsnippet <n>`.
#[derive(Default)]
struct SessionState {
    last_query: String,
    results: Vec<ResultEntry>,
}

/// Runs the protocol loop for one accepted connection until EOF, a write
/// failure, or `quit`.
///
/// Commands within a connection are processed strictly in the order
/// received, and responses are written in the same order; there is no
/// ordering guarantee across connections.
pub fn handle_connection(
    mut stream: TcpStream,
    index: Arc<InvertedIndex>,
    corpus: Arc<dyn CorpusProvider>,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    if !send_line(&mut stream, "Welcome to Search Server!") {
        return;
    }

    let mut state = SessionState::default();
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });

    while let Some(line) = read_line(&mut reader) {
        let command = line.trim_matches(|c| " \r\n\t".contains(c));
        if command.is_empty() {
            continue;
        }

        if let Some(query) = command.strip_prefix("search ") {
            if !handle_search(&mut stream, &index, &mut state, query) {
                break;
            }
        } else if let Some(arg) = command.strip_prefix("getsnippet ") {
            if !handle_getsnippet(&mut stream, &corpus, &state, arg) {
                break;
            }
        } else if command == "quit" {
            let _ = send_line(&mut stream, "BYE");
            break;
        } else if !send_line(&mut stream, "Unknown command") {
            break;
        }
    }

    debug!("client {} disconnected", peer);
}

fn handle_search(
    stream: &mut TcpStream,
    index: &InvertedIndex,
    state: &mut SessionState,
    query: &str,
) -> bool {
    let start = Instant::now();
    let raw_results = index.search(query);
    debug!("search {:?} took {:?}", query, start.elapsed());

    state.last_query = query.to_string();
    state.results = raw_results
        .into_iter()
        .map(|r| ResultEntry {
            file_name: base_name(&r.document_path),
            path: r.document_path,
            match_count: r.match_start_char_offsets.len(),
            match_char_offsets: r.match_start_char_offsets,
        })
        .collect();

    if state.results.is_empty() {
        return send_line(stream, "NOT_FOUND");
    }

    let mut response = format!("OK:{}\n", state.results.len());
    for (i, entry) in state.results.iter().enumerate() {
        trace!("result {}: {} ({} matches)", i, entry.file_name, entry.match_count);
        // Matches a C++ `ostream`'s default float formatting, which
        // trims the trailing ".0" for whole numbers (`1.0f` prints as
        // `1`, not `1.0`); Rust's own `{}` on an `f64` does the same.
        response.push_str(&format!(
            "[{}] {} | matches={}\n",
            i, entry.path, entry.match_count as f64
        ));
    }
    send_raw(stream, &response)
}

fn handle_getsnippet(
    stream: &mut TcpStream,
    corpus: &Arc<dyn CorpusProvider>,
    state: &SessionState,
    arg: &str,
) -> bool {
    if state.results.is_empty() {
        return send_line(stream, "ERROR_NO_RESULTS");
    }

    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return send_line(stream, "ERROR_INVALID_INDEX");
    }

    let index: usize = match arg.parse() {
        Ok(n) => n,
        Err(_) => return send_line(stream, "ERROR_INVALID_INDEX"),
    };

    let entry = match state.results.get(index) {
        Some(entry) => entry,
        None => return send_line(stream, "ERROR_INVALID_INDEX"),
    };

    let content = corpus.read(std::path::Path::new(&entry.path));
    if content.is_empty() {
        return send_line(stream, "ERROR_READING_FILE");
    }

    let snippets = engine::snippet::build_snippets(
        &content,
        state.last_query.len(),
        &entry.match_char_offsets,
    );

    if snippets.is_empty() {
        return send_line(stream, "ERROR_NO_SNIPPETS");
    }

    let response = format!("SNIPPETS_FOUND:{}\n{}\n", snippets.len(), snippets.join(";"));
    send_raw(stream, &response)
}

/// Reads one `\n`-terminated line, stripping any `\r`. Returns `None` on
/// EOF or a read error.
fn read_line(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            // EOF before a terminating '\n' ends the session, even if a
            // partial line had already been read, matching the original's
            // `recv(...) > 0` read loop.
            Ok(0) => return None,
            Ok(_) => {
                if byte[0] == b'\n' {
                    return Some(to_string(line));
                }
                if byte[0] != b'\r' {
                    line.push(byte[0]);
                }
            }
            Err(_) => return None,
        }
    }
}

fn to_string(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

fn send_line(stream: &mut TcpStream, line: &str) -> bool {
    send_raw(stream, &format!("{}\n", line))
}

fn send_raw(stream: &mut TcpStream, data: &str) -> bool {
    stream.write_all(data.as_bytes()).is_ok()
}
