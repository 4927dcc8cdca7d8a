//! Evidence bundle builder and serializers.
//!
//! Pure, side-effect-free transforms: merge the pipeline's outputs into
//! the canonical [`ContextBundle`], render it as a bounded prompt block
//! (omitting empty sections), and produce a compact log digest. All three
//! are deterministic functions of their inputs only.

use ideaforge_shared::{
    BundleBrand, BundleCompany, BundlePage, CompanyContext, ContextBundle, NewsItem,
    ProductItem, Theme,
};

/// The rendered prompt block is truncated to this many characters.
pub const MAX_PROMPT_CHARS: usize = 6_000;

/// Merge the gathered evidence into the canonical bundle shape.
pub fn build_bundle(
    company: &CompanyContext,
    theme: &Theme,
    pages: Vec<BundlePage>,
    press: Vec<String>,
    news: Vec<NewsItem>,
    products: Vec<ProductItem>,
    product_patterns: Vec<String>,
) -> ContextBundle {
    ContextBundle {
        company: BundleCompany {
            name: company.name.clone(),
            url: company.url.clone(),
            description: company.description.clone(),
            industry_hints: company.industry_hints.clone(),
        },
        pages,
        brand: BundleBrand {
            primary: theme.primary.clone(),
            accent: theme.accent.clone(),
            source: theme.source,
        },
        press,
        news,
        products,
        product_patterns,
    }
}

/// Render the bundle as a bounded text block for generation prompts.
///
/// Sections with zero items are omitted entirely.
pub fn render_prompt(bundle: &ContextBundle) -> String {
    let mut out = String::new();

    out.push_str(&format!("Company: {}\n", bundle.company.name));
    if let Some(url) = &bundle.company.url {
        out.push_str(&format!("Website: {url}\n"));
    }
    if let Some(description) = &bundle.company.description {
        out.push_str(&format!("Description: {description}\n"));
    }
    if !bundle.company.industry_hints.is_empty() {
        out.push_str(&format!(
            "Industry: {}\n",
            bundle.company.industry_hints.join(", ")
        ));
    }

    if !bundle.pages.is_empty() {
        out.push_str("\nSite pages:\n");
        for page in &bundle.pages {
            let title = page.title.as_deref().unwrap_or(&page.url);
            out.push_str(&format!("- {title}"));
            if !page.headings.is_empty() {
                out.push_str(&format!(" ({})", page.headings.join("; ")));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "\nBrand: primary {} / accent {}\n",
        bundle.brand.primary, bundle.brand.accent
    ));

    if !bundle.press.is_empty() {
        out.push_str("\nPress headlines:\n");
        for headline in &bundle.press {
            out.push_str(&format!("- {headline}\n"));
        }
    }

    if !bundle.news.is_empty() {
        out.push_str("\nRecent news:\n");
        for item in &bundle.news {
            match &item.source {
                Some(source) => out.push_str(&format!("- {} ({source})\n", item.title)),
                None => out.push_str(&format!("- {}\n", item.title)),
            }
        }
    }

    if !bundle.products.is_empty() {
        out.push_str("\nProduct landscape:\n");
        for product in &bundle.products {
            match &product.tagline {
                Some(tagline) => out.push_str(&format!("- {}: {tagline}\n", product.name)),
                None => out.push_str(&format!("- {}\n", product.name)),
            }
        }
        if !bundle.product_patterns.is_empty() {
            out.push_str(&format!(
                "Recurring themes: {}\n",
                bundle.product_patterns.join(", ")
            ));
        }
    }

    truncate_chars(&out, MAX_PROMPT_CHARS)
}

/// Compact one-line digest of what the bundle contains.
pub fn digest(bundle: &ContextBundle) -> String {
    format!(
        "{}: {} pages, {} press, {} news, {} products, brand {} ({})",
        bundle.company.name,
        bundle.pages.len(),
        bundle.press.len(),
        bundle.news.len(),
        bundle.products.len(),
        bundle.brand.primary,
        bundle.brand.source.as_str(),
    )
}

/// Short preview of the rendered prompt, for logs.
pub fn preview(bundle: &ContextBundle) -> String {
    let prompt = render_prompt(bundle);
    let flat = prompt.replace('\n', " | ");
    truncate_chars(&flat, 160)
}

/// Truncate at a char boundary, appending an ellipsis when cut.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}…")
}
