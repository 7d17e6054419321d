//! Writer for `.ninja` build files.

/// Accumulates a ninja file, wrapping long lines with `$` continuations.
#[derive(Debug)]
pub struct NinjaWriter {
  out: String,
  width: usize,
}

impl NinjaWriter {
  pub fn new(width: usize) -> Self {
    Self {
      out: String::new(),
      width,
    }
  }

  pub fn newline(&mut self) {
    self.out.push('\n');
  }

  pub fn variable(&mut self, key: &str, value: &str, indent: usize) {
    self.line(&format!("{} = {}", key, value), indent);
  }

  /// A rule block. Variables without a value are left out.
  pub fn rule(&mut self, name: &str, variables: &[(&str, Option<&str>)]) {
    self.line(&format!("rule {}", name), 0);
    for (key, value) in variables {
      if let Some(value) = value {
        self.variable(key, value, 1);
      }
    }
  }

  /// A build statement. Paths are escaped.
  pub fn build(&mut self, outputs: &[String], rule: &str, inputs: &[String]) {
    let outputs = outputs.iter().map(|o| escape_path(o)).collect::<Vec<_>>();
    let rule_and_inputs = std::iter::once(rule.to_string())
      .chain(inputs.iter().map(|i| escape_path(i)))
      .collect::<Vec<_>>();
    self.line(&format!("build {}: {}", outputs.join(" "), rule_and_inputs.join(" ")), 0);
  }

  pub fn finish(self) -> String {
    self.out
  }

  fn line(&mut self, text: &str, indent: usize) {
    let mut leading = "  ".repeat(indent);
    let mut text = text;

    while leading.len() + text.len() > self.width {
      let bytes = text.as_bytes();
      let available = self.width.saturating_sub(leading.len() + " $".len());

      let Some(space) = rfind_unescaped_space(bytes, available).or_else(|| find_unescaped_space(bytes, available)) else {
        break;
      };

      self.out.push_str(&leading);
      self.out.push_str(&text[..space]);
      self.out.push_str(" $\n");
      text = &text[space + 1..];

      // continuation lines
      leading = "  ".repeat(indent + 2);
    }

    self.out.push_str(&leading);
    self.out.push_str(text);
    self.out.push('\n');
  }
}

/// Number of `$` right in front of `bytes[i]`. The first byte is never counted.
fn count_dollars_before(bytes: &[u8], i: usize) -> usize {
  let mut count = 0;
  let mut j = i;
  while j > 1 && bytes[j - 1] == b'$' {
    count += 1;
    j -= 1;
  }
  count
}

/// Rightmost unescaped space before `end`.
fn rfind_unescaped_space(bytes: &[u8], end: usize) -> Option<usize> {
  let mut end = end.min(bytes.len());
  loop {
    let space = bytes[..end].iter().rposition(|b| *b == b' ')?;
    if count_dollars_before(bytes, space) % 2 == 0 {
      return Some(space);
    }
    end = space;
  }
}

/// Leftmost unescaped space at or after `start`.
fn find_unescaped_space(bytes: &[u8], start: usize) -> Option<usize> {
  let mut start = start;
  loop {
    let space = start + bytes.get(start..)?.iter().position(|b| *b == b' ')?;
    if count_dollars_before(bytes, space) % 2 == 0 {
      return Some(space);
    }
    start = space + 1;
  }
}

/// Escape a string so ninja takes it literally.
pub fn escape(s: &str) -> String {
  s.replace('$', "$$")
}

/// Escape spaces and colons in a path.
pub fn escape_path(path: &str) -> String {
  path.replace("$ ", "$$ ").replace(' ', "$ ").replace(':', "$:")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_lines_are_kept() {
    let mut w = NinjaWriter::new(78);
    w.variable("builddir", ".", 0);
    w.rule("cc", &[("command", Some("cc -c $in -o $out")), ("depfile", None)]);
    assert_eq!(w.finish(), "builddir = .\nrule cc\n  command = cc -c $in -o $out\n");
  }

  #[test]
  fn long_lines_wrap_at_spaces() {
    let mut w = NinjaWriter::new(22);
    w.build(&["out".to_string()], "cc", &["aaaaaaaa".to_string(), "bbbbbbbb".to_string()]);
    assert_eq!(w.finish(), "build out: cc $\n    aaaaaaaa bbbbbbbb\n");
  }

  #[test]
  fn escaped_spaces_are_not_wrap_points() {
    let mut w = NinjaWriter::new(20);
    w.build(&["out".to_string()], "cc", &["my file.c".to_string()]);
    assert_eq!(w.finish(), "build out: cc $\n    my$ file.c\n");
  }

  #[test]
  fn unbreakable_lines_are_left_long() {
    let mut w = NinjaWriter::new(10);
    w.variable("x", "abcdefghijklmnop", 0);
    assert_eq!(w.finish(), "x = $\n    abcdefghijklmnop\n");
  }

  #[test]
  fn paths_escape_spaces_and_colons() {
    assert_eq!(escape_path("c:/my dir/a.c"), "c$:/my$ dir/a.c");
    assert_eq!(escape_path("a$ b"), "a$$$ b");
    assert_eq!(escape("cost $5"), "cost $$5");
  }
}
