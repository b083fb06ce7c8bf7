use crate::error::{BridgeError, Result};
use crate::rules::translate::{translate_pattern, translate_template};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// A path substitution rule, as accepted by the `-s` flag of tarsnap.
///
/// The rule keeps its source text so it can be rendered back exactly as it
/// was given, which is what gets handed to the tool.
#[derive(Debug, Clone)]
pub struct Rule {
	/// Compiled left-hand side.
	matcher: Regex,

	/// Expansion template for the right-hand side.
	template: String,

	/// Replace all occurrences. Stored for display only; see [`Rule::apply`].
	pub global: bool,

	/// Print the result of each substitution.
	pub print: bool,

	/// Apply the rule to symlink targets.
	pub symlink: bool,

	pattern_src: String,
	replacement_src: String,
}

impl Rule {
	/// Parse a rule of the form `/old/new/flags`.
	///
	/// `old` is a POSIX basic regular expression, `new` may refer to the whole
	/// match with `~` and to groups with `\1`..`\9`, and `flags` is any mix of
	/// `g`, `p` and `s` in either case.
	///
	/// A reference to a group the pattern does not have is accepted and
	/// expands to nothing.
	pub fn parse(input: &str) -> Result<Self> {
		let parts: Vec<&str> = input.splitn(4, '/').collect();
		if parts.len() != 4 || !parts[0].is_empty() {
			return Err(BridgeError::InvalidRuleFormat {
				rule: input.to_string(),
			});
		}

		let pattern = translate_pattern(parts[1]);
		let matcher = Regex::new(&pattern).map_err(|source| BridgeError::InvalidPattern {
			pattern: parts[1].to_string(),
			source,
		})?;

		let mut rule = Rule {
			matcher,
			template: translate_template(parts[2]),
			global: false,
			print: false,
			symlink: false,
			pattern_src: parts[1].to_string(),
			replacement_src: parts[2].to_string(),
		};

		for flag in parts[3].chars() {
			match flag.to_ascii_lowercase() {
				'g' => rule.global = true,
				'p' => rule.print = true,
				's' => rule.symlink = true,
				_ => {
					return Err(BridgeError::UnknownFlag {
						flag,
						rule: input.to_string(),
					});
				}
			}
		}

		Ok(rule)
	}

	/// Apply the rule to `input`.
	///
	/// Returns the rewritten string and `true` if the pattern matched, or the
	/// input unchanged and `false` otherwise. Only the leftmost match is
	/// replaced, whether or not the rule is global.
	pub fn apply(&self, input: &str) -> (String, bool) {
		let Some(caps) = self.matcher.captures(input) else {
			return (input.to_string(), false);
		};
		let Some(whole) = caps.get(0) else {
			return (input.to_string(), false);
		};

		let mut out = String::with_capacity(input.len() + self.template.len());
		out.push_str(&input[..whole.start()]);
		caps.expand(&self.template, &mut out);
		out.push_str(&input[whole.end()..]);
		(out, true)
	}

	/// The translated pattern as compiled by the regex engine.
	pub fn matcher(&self) -> &Regex {
		&self.matcher
	}

	/// The translated expansion template.
	pub fn template(&self) -> &str {
		&self.template
	}

	fn flags(&self) -> String {
		let mut flags = String::new();
		if self.global {
			flags.push('g');
		}
		if self.print {
			flags.push('p');
		}
		if self.symlink {
			flags.push('s');
		}
		flags
	}
}

impl fmt::Display for Rule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"/{}/{}/{}",
			self.pattern_src,
			self.replacement_src,
			self.flags()
		)
	}
}

impl FromStr for Rule {
	type Err = BridgeError;

	fn from_str(s: &str) -> Result<Self> {
		Rule::parse(s)
	}
}

/// Apply each rule in turn and return the result of the first one that
/// matches, mirroring how tarsnap picks a substitution for a path.
pub fn apply_first(rules: &[Rule], input: &str) -> (String, bool) {
	rules
		.iter()
		.map(|rule| rule.apply(input))
		.find(|(_, matched)| *matched)
		.unwrap_or_else(|| (input.to_string(), false))
}
