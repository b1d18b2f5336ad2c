// tests/classify_rules.rs
// The rule table is a contract: exact keywords, exact priority.
use cb_live_feed::classify::{classify, is_cb_related, CATEGORY_RULES};
use cb_live_feed::Category;

#[test]
fn rule_table_is_pinned() {
    let expected: &[(Category, &[&str])] = &[
        (Category::Refix, &["리픽싱", "재조정"]),
        (Category::Conversion, &["전환청구", "전환가", "전환권 행사"]),
        (Category::Redemption, &["조기상환", "콜옵션", "풋옵션"]),
        (Category::Issue, &["발행결정", "발행", "매입", "취득"]),
    ];
    assert_eq!(CATEGORY_RULES, expected);
}

#[test]
fn refix_outranks_issue() {
    assert_eq!(classify("전환사채 발행결정 및 리픽싱 조항"), Category::Refix);
    assert_eq!(classify("리픽싱 후 발행결정"), Category::Refix);
}

#[test]
fn every_keyword_maps_to_its_category() {
    for (cat, kws) in CATEGORY_RULES {
        for kw in *kws {
            assert_eq!(classify(&format!("공시: {kw}")), *cat, "{kw}");
        }
    }
}

#[test]
fn priority_chain_is_strict() {
    assert_eq!(classify("전환가 조정과 조기상환"), Category::Conversion);
    assert_eq!(classify("콜옵션 행사 및 자사주 취득"), Category::Redemption);
    assert_eq!(classify("자기주식 취득 결정"), Category::Issue);
    assert_eq!(classify("주주총회 소집"), Category::Other);
}

#[test]
fn classification_is_deterministic() {
    let text = "EB 교환가 재조정, 콜옵션";
    let first = classify(text);
    for _ in 0..100 {
        assert_eq!(classify(text), first);
    }
}

#[test]
fn cb_scope_examples() {
    assert!(is_cb_related("[기재정정]전환사채 리픽싱(전환가액의 조정)"));
    assert!(is_cb_related("주요사항보고서(전환사채권발행결정)"));
    assert!(is_cb_related("BW 납입 완료"));
    assert!(!is_cb_related("임원ㆍ주요주주특정증권등소유상황보고서"));
}
