use std::io::Write;

use goldenfile::Mint;

/// Compares `content` with the golden file at `golden_path` under
/// `testdata/tenq`. Run with `UPDATE_GOLDENFILES=1` to rewrite it.
pub fn golden_test(content: &str, golden_path: &str) {
    let mut mint = Mint::new("testdata/tenq");
    let differ = Box::new(goldenfile::differs::text_diff);
    let mut out = mint
        .new_goldenfile_with_differ(golden_path, differ)
        .expect("new goldenfile");

    out.write_all(content.as_bytes()).expect("write output");
}

/// Asserts that two multi-line strings are equal, printing a line diff
/// when they are not.
#[macro_export]
macro_rules! assert_text_eq {
    ($want:expr, $got:expr) => {
        let want: &str = &$want;
        let got: &str = &$got;
        if want != got {
            text_diff::assert_diff(want, got, "\r\n", 0);
        }
    };
}
