/// Compact s-expression printing for syntax trees, with an indenting variant
/// for human consumption.
pub trait MiniPrint {
    fn simple_print(&self) -> String;

    fn pretty_print(&self) -> String {
        let src = self.simple_print();
        let mut level = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut res = String::new();
        let indent = "   ";
        for c in src.chars() {
            if in_string {
                match (escaped, c) {
                    (false, '\\') => escaped = true,
                    (false, '"') => in_string = false,
                    _ => escaped = false,
                }
                res.push(c);
                continue;
            }
            match c {
                '"' => in_string = true,
                '(' => level += 1,
                ')' => level = level.saturating_sub(1),
                ' ' => {
                    res.push('\n');
                    res.push_str(&indent.repeat(level));
                    continue;
                }
                _ => {}
            }
            res.push(c);
        }
        res
    }
}
