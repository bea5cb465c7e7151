//! NZB fixtures and test content generators

/// Error page some engines return instead of an NZB
pub const NOT_FOUND_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Error</title></head>
<body><p>The NZB you requested does not exist.</p></body></html>"#;

/// Build an NZB for a release split into rar parts
///
/// Every subject announces `announced_files`; `files` lists per present file
/// the announced and the present segment count. Message-IDs are unique.
pub fn release_nzb(name: &str, announced_files: u32, files: &[(u32, u32)]) -> String {
    let mut body = String::new();

    for (index, &(announced_segments, present)) in files.iter().enumerate() {
        let index = index + 1;
        body.push_str(&format!(
            r#"  <file poster="poster@example.com" date="{date}" subject="{name} [{index}/{announced_files}] - &quot;{name}.part{index:02}.rar&quot; yEnc (1/{announced_segments})">
    <groups>
      <group>alt.binaries.test</group>
    </groups>
    <segments>
"#,
            date = 1_700_000_000 + index * 60,
        ));
        for number in 1..=present {
            body.push_str(&format!(
                "      <segment bytes=\"768000\" number=\"{number}\">{name}-{index}-{number}@test.local</segment>\n"
            ));
        }
        body.push_str("    </segments>\n  </file>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
{body}</nzb>"#
    )
}

/// All announced files with all their segments
pub fn complete_nzb(name: &str, files: u32, segments: u32) -> String {
    let parts: Vec<(u32, u32)> = (0..files).map(|_| (segments, segments)).collect();
    release_nzb(name, files, &parts)
}

/// Half of the announced files, which fails every default tolerance
pub fn incomplete_nzb(name: &str) -> String {
    release_nzb(name, 10, &[(5, 5); 5])
}

/// All files, 1 of 100 segments missing: passes, but not as complete
pub fn one_percent_missing_nzb(name: &str) -> String {
    release_nzb(name, 4, &[(25, 25), (25, 25), (25, 24), (25, 25)])
}

/// All files, 2 of 100 segments missing
pub fn two_percent_missing_nzb(name: &str) -> String {
    release_nzb(name, 4, &[(25, 25), (25, 24), (25, 24), (25, 25)])
}
