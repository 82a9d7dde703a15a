//! Command-line parser for the pipeline shell.
//!
//! One decrypted line of input becomes a sequence of pipelines (`&&`
//! separated), each a sequence of commands (`|` separated), each a list of
//! tokens with redirections and a background flag peeled off. Parsing is
//! deliberately lenient: malformed input yields fewer pipelines, never an
//! error, and nothing is executed from a partially parsed command.

/// One process to spawn: argv plus redirections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// Program name followed by its arguments. Never empty once the command
    /// has been placed in a [`Pipeline`]; argument-less commands are dropped
    /// during parsing.
    pub args: Vec<String>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub append_output: bool,
    pub background: bool,
}

/// Ordered commands connected stdout -> stdin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

/// Parse one line of input into pipelines. Empty commands and empty
/// pipelines are silently discarded.
pub fn parse_input(input: &str) -> Vec<Pipeline> {
    split_pipelines(input)
        .iter()
        .filter_map(|pipeline_str| {
            let commands: Vec<Command> = split_commands(pipeline_str)
                .iter()
                .map(|cmd_str| interpret_tokens(&tokenize(cmd_str)))
                .filter(|cmd| !cmd.args.is_empty())
                .collect();

            if commands.is_empty() {
                None
            } else {
                Some(Pipeline { commands })
            }
        })
        .collect()
}

/// Split on unescaped `&&` while tracking quote state, so a literal `&&`
/// inside quotes does not end a pipeline. Quote characters stay in the
/// substrings; the tokenizer strips them later.
fn split_pipelines(input: &str) -> Vec<String> {
    let mut pipelines = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '\0';

    for c in input.chars() {
        if (c == '"' || c == '\'') && !current.ends_with('\\') {
            if !in_quotes {
                in_quotes = true;
                quote_char = c;
            } else if c == quote_char {
                in_quotes = false;
                quote_char = '\0';
            }
        }

        if !in_quotes && c == '&' && current.ends_with('&') {
            current.pop();
            if !current.trim().is_empty() {
                pipelines.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        } else {
            current.push(c);
        }
    }

    if !current.trim().is_empty() {
        pipelines.push(current);
    }

    pipelines
}

/// Split a pipeline substring on unescaped `|` into command substrings.
fn split_commands(pipeline: &str) -> Vec<String> {
    let chars: Vec<char> = pipeline.chars().collect();
    let mut commands = Vec::new();
    let mut current = String::new();

    for i in 0..chars.len() {
        if chars[i] == '|' && (i == 0 || chars[i - 1] != '\\') {
            if !current.is_empty() {
                commands.push(std::mem::take(&mut current));
            }
        } else {
            current.push(chars[i]);
        }
    }

    if !current.is_empty() {
        commands.push(current);
    }

    commands
}

/// Split a command substring on unquoted whitespace. A matching `"..."` or
/// `'...'` span is one token with the quote characters stripped; a backslash
/// immediately before a quote character suppresses its delimiter role.
pub fn tokenize(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut in_quotes = false;
    let mut quote_char = '\0';

    for i in 0..chars.len() {
        let c = chars[i];

        if (c == '"' || c == '\'') && (i == 0 || chars[i - 1] != '\\') {
            if !in_quotes {
                in_quotes = true;
                quote_char = c;
            } else if c == quote_char {
                in_quotes = false;
                quote_char = '\0';
            } else {
                token.push(c);
            }
        } else if !in_quotes && (c == ' ' || c == '\t') {
            if !token.is_empty() {
                tokens.push(std::mem::take(&mut token));
            }
        } else {
            token.push(c);
        }
    }

    if !token.is_empty() {
        tokens.push(token);
    }

    tokens
}

/// Left-to-right token interpretation. Redirection operators are recognized
/// only by exact token match: `<` must be its own token, `a<b` is an
/// ordinary argument. A lone trailing `&` marks the command for background
/// execution.
fn interpret_tokens(tokens: &[String]) -> Command {
    let mut cmd = Command::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i].as_str() {
            "<" => {
                if i + 1 < tokens.len() {
                    i += 1;
                    cmd.input_file = Some(tokens[i].clone());
                }
            }
            ">" => {
                if i + 1 < tokens.len() {
                    i += 1;
                    cmd.output_file = Some(tokens[i].clone());
                    cmd.append_output = false;
                }
            }
            ">>" => {
                if i + 1 < tokens.len() {
                    i += 1;
                    cmd.output_file = Some(tokens[i].clone());
                    cmd.append_output = true;
                }
            }
            "&" if i == tokens.len() - 1 => {
                cmd.background = true;
            }
            _ => {
                cmd.args.push(tokens[i].clone());
            }
        }
        i += 1;
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_quoted_spans() {
        assert_eq!(tokenize(r#"a "b c" d"#), vec!["a", "b c", "d"]);
        assert_eq!(tokenize("echo 'hello   world'"), vec!["echo", "hello   world"]);
        // Mismatched quote kind inside a span is kept literally.
        assert_eq!(tokenize(r#"echo "it's fine""#), vec!["echo", "it's fine"]);
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  ls   -l\t/tmp  "), vec!["ls", "-l", "/tmp"]);
        assert!(tokenize("   \t ").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_pipeline_and_pipe_splits() {
        let pipelines = parse_input("cmd1 | cmd2 && cmd3");
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].commands.len(), 2);
        assert_eq!(pipelines[0].commands[0].args, vec!["cmd1"]);
        assert_eq!(pipelines[0].commands[1].args, vec!["cmd2"]);
        assert_eq!(pipelines[1].commands.len(), 1);
        assert_eq!(pipelines[1].commands[0].args, vec!["cmd3"]);
    }

    #[test]
    fn test_quoted_separator_is_not_a_split() {
        let pipelines = parse_input(r#"echo "a && b""#);
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].commands[0].args, vec!["echo", "a && b"]);
    }

    #[test]
    fn test_escaped_pipe_is_not_a_split() {
        let pipelines = parse_input(r"echo a\|b");
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].commands.len(), 1);
    }

    #[test]
    fn test_redirection_tokens() {
        let pipelines = parse_input("sort < in.txt > out.txt");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.args, vec!["sort"]);
        assert_eq!(cmd.input_file.as_deref(), Some("in.txt"));
        assert_eq!(cmd.output_file.as_deref(), Some("out.txt"));
        assert!(!cmd.append_output);

        let pipelines = parse_input("echo hi >> log.txt");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.output_file.as_deref(), Some("log.txt"));
        assert!(cmd.append_output);
    }

    #[test]
    fn test_redirection_requires_exact_token() {
        // "a<b" is one argument, not a redirection.
        let pipelines = parse_input("echo a<b");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.args, vec!["echo", "a<b"]);
        assert!(cmd.input_file.is_none());
    }

    #[test]
    fn test_redirection_only_on_last_command_target() {
        let pipelines = parse_input("producer | consumer > out.txt");
        let cmds = &pipelines[0].commands;
        assert!(cmds[0].output_file.is_none());
        assert_eq!(cmds[1].output_file.as_deref(), Some("out.txt"));
    }

    #[test]
    fn test_trailing_ampersand_marks_background() {
        let pipelines = parse_input("sleep 10 &");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.args, vec!["sleep", "10"]);
        assert!(cmd.background);

        // `&` in the middle of the token list is an ordinary argument.
        let pipelines = parse_input("echo & hi");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.args, vec!["echo", "&", "hi"]);
        assert!(!cmd.background);
    }

    #[test]
    fn test_empty_commands_and_pipelines_dropped() {
        assert!(parse_input("").is_empty());
        assert!(parse_input("   ").is_empty());
        assert!(parse_input("&&").is_empty());
        assert!(parse_input(" && ").is_empty());

        // Stray pipes leave only the real command behind.
        let pipelines = parse_input("| ls |");
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].commands.len(), 1);
        assert_eq!(pipelines[0].commands[0].args, vec!["ls"]);
    }

    #[test]
    fn test_dangling_redirection_is_dropped() {
        // A trailing `<` with no target is ignored rather than erroring.
        let pipelines = parse_input("cat <");
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.args, vec!["cat"]);
        assert!(cmd.input_file.is_none());
    }
}
