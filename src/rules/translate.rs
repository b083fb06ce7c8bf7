//! Translation from the POSIX BRE dialect used by `tarsnap -s` into the
//! syntax understood by the `regex` crate.

/// Characters the `regex` crate treats as operators outside a bracket
/// expression. Only these are ever quoted.
const META: &[char] = &[
	'\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// Translate a POSIX basic regular expression into `regex` syntax.
///
/// In a BRE, bare parentheses and braces match themselves and their escaped
/// forms are operators, which is the opposite of `regex`. Operators that a BRE
/// does not know unescaped (`|`, `+`, `?`) are quoted, while any other escape
/// sequence is passed through so that engine extensions such as `\|` still
/// work. A trailing lone backslash is dropped.
pub fn translate_pattern(bre: &str) -> String {
	let mut re = String::with_capacity(bre.len() * 2);
	let mut escaped = false;

	for ch in bre.chars() {
		match ch {
			'(' | ')' | '{' | '}' => {
				if !escaped {
					re.push('\\');
				}
				re.push(ch);
				escaped = false;
				continue;
			}
			'^' | '[' | ']' | '$' | '.' | '*' if !escaped => {
				re.push(ch);
				continue;
			}
			'\\' => {
				if escaped {
					re.push_str(r"\\");
				}
				escaped = !escaped;
				continue;
			}
			_ => {}
		}

		if escaped {
			re.push('\\');
			re.push(ch);
			escaped = false;
		} else {
			push_quoted(&mut re, ch);
		}
	}
	re
}

/// Translate a `tarsnap -s` replacement string into a `regex` expansion
/// template.
///
/// `~` stands for the whole match and `\1` through `\9` for capture groups.
/// A bare `$` is literal, since it would otherwise start a group reference.
pub fn translate_template(replacement: &str) -> String {
	let mut out = String::with_capacity(replacement.len() + 8);
	let mut escaped = false;

	for ch in replacement.chars() {
		if escaped {
			escaped = false;
			match ch {
				'1'..='9' => {
					out.push_str("${");
					out.push(ch);
					out.push('}');
				}
				'\\' => out.push('\\'),
				'$' => out.push_str(r"\$$"),
				_ => {
					out.push('\\');
					out.push(ch);
				}
			}
			continue;
		}

		match ch {
			'\\' => escaped = true,
			'$' => out.push_str("$$"),
			'~' => out.push_str("${0}"),
			_ => out.push(ch),
		}
	}
	out
}

fn push_quoted(re: &mut String, ch: char) {
	if META.contains(&ch) {
		re.push('\\');
	}
	re.push(ch);
}
