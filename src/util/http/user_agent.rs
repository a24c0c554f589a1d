use rand::{seq::IndexedRandom, Rng};

const CHROME_VERSIONS: [&str; 12] = [
    "133.0.6943.98",
    "133.0.6943.60",
    "132.0.6834.110",
    "132.0.6834.83",
    "131.0.6778.108",
    "131.0.6778.85",
    "130.0.6723.117",
    "130.0.6723.92",
    "129.0.6668.89",
    "128.0.6613.138",
    "127.0.6533.119",
    "126.0.6478.182",
];

const FIREFOX_VERSIONS: [&str; 8] = [
    "133.0", "132.0", "131.0", "130.0", "129.0", "128.0", "127.0", "126.0",
];

const EDGE_VERSIONS: [&str; 6] = [
    "133.0.3065.69",
    "132.0.2957.140",
    "131.0.2903.112",
    "130.0.2849.80",
    "129.0.2792.89",
    "128.0.2739.79",
];

/// 只使用桌面平台，行動版頁面的結構與解析器預期不同
const DESKTOP_OS: [&str; 5] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 11.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 14_4_1",
    "X11; Linux x86_64",
];

fn pick<'a>(items: &[&'a str]) -> &'a str {
    items.choose(&mut rand::rng()).copied().unwrap_or(items[0])
}

fn gen_chrome_ua() -> String {
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        pick(&DESKTOP_OS),
        pick(&CHROME_VERSIONS)
    )
}

fn gen_firefox_ua() -> String {
    let ver = pick(&FIREFOX_VERSIONS);
    let os = pick(&DESKTOP_OS).replace("Intel Mac OS X 14_4_1", "Intel Mac OS X 14.4");
    format!(
        "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
        os, ver, ver
    )
}

fn gen_edge_ua() -> String {
    let edge = pick(&EDGE_VERSIONS);
    let chrome = edge.split('.').next().unwrap_or("133");
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}",
        pick(&DESKTOP_OS[..2]),
        chrome,
        edge
    )
}

pub fn gen_random_ua() -> String {
    match rand::rng().random_range(0..10) {
        0..=5 => gen_chrome_ua(), // 60% Chrome
        6..=7 => gen_firefox_ua(),
        _ => gen_edge_ua(),
    }
}
