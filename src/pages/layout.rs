/// Document-level metadata shared by every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteMetadata {
    pub title: &'static str,
    pub description: &'static str,
    pub lang: &'static str,
}

pub const SITE_METADATA: SiteMetadata = SiteMetadata {
    title: "EasyBill - 个人财务管理",
    description: "智能账单管理系统",
    lang: "zh-CN",
};

/// Wraps `children` in the HTML document shell.
///
/// `children` is inserted verbatim.
pub fn root_layout(children: &str) -> String {
    let SiteMetadata {
        title,
        description,
        lang,
    } = SITE_METADATA;

    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <meta name="description" content="{description}">
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body>{children}</body>
</html>
"#
    )
}
