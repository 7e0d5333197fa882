use super::*;

fn wrap(blocks: &str) -> String {
    format!("<html><body><div id=\"cm_cr-review_list\">{blocks}</div></body></html>")
}

const FULL_BLOCK: &str = r##"
<div data-hook="review" id="R1ABCDEFG">
  <span class="a-profile-name">Jean Dupont</span>
  <a data-hook="review-title" href="#"><span>4,0 sur 5 étoiles</span> <span>Très bon produit</span></a>
  <i data-hook="review-star-rating"><span class="a-icon-alt">4,0 sur 5 étoiles</span></i>
  <span data-hook="review-date">Commenté en France le 15 janvier 2024</span>
  <span data-hook="avp-badge">Achat vérifié</span>
  <span data-hook="format-strip">Couleur: Noir</span>
  <span data-hook="review-body"><span>Fonctionne parfaitement, je recommande.</span></span>
  <span data-hook="helpful-vote-statement">3 personnes ont trouvé cela utile</span>
</div>
"##;

#[test]
fn full_block_yields_all_fields() {
    let drafts = extract_reviews(&wrap(FULL_BLOCK)).unwrap();
    assert_eq!(drafts.len(), 1);
    let r = &drafts[0];
    assert_eq!(r.review_id, "R1ABCDEFG");
    assert_eq!(r.title.as_deref(), Some("Très bon produit"));
    assert_eq!(
        r.body.as_deref(),
        Some("Fonctionne parfaitement, je recommande.")
    );
    assert_eq!(r.rating, Some(4.0));
    assert_eq!(r.review_date.as_deref(), Some("2024-01-15"));
    assert!(r.verified_purchase);
    assert_eq!(r.helpful_votes, 3);
    assert_eq!(r.reviewer_name.as_deref(), Some("Jean Dupont"));
    assert_eq!(r.variant.as_deref(), Some("Couleur: Noir"));
}

#[test]
fn nested_customer_review_id_is_used_when_block_has_none() {
    let html = wrap(
        r#"<div data-hook="review">
             <div id="customer_review-R2NESTED99">
               <span data-hook="review-body">Correct sans plus.</span>
             </div>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].review_id, "R2NESTED99");
}

#[test]
fn permalink_id_is_third_resort() {
    let html = wrap(
        r#"<div data-hook="review">
             <a href="/gp/customer-reviews/R3PERMA77/ref=cm_cr">lien</a>
             <span data-hook="review-body">Bien emballé.</span>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    assert_eq!(drafts[0].review_id, "R3PERMA77");
}

#[test]
fn content_hash_is_final_fallback() {
    let html = wrap(
        r#"<div data-hook="review">
             <span data-hook="review-title">Déçu</span>
             <span data-hook="review-body">Ne fonctionne plus après une semaine.</span>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    let expected =
        normalize::fallback_review_id("Déçu", "Ne fonctionne plus après une semaine.");
    assert_eq!(drafts[0].review_id, expected);
    assert!(drafts[0].review_id.starts_with("generated_"));
}

#[test]
fn duplicate_ids_within_page_are_collapsed() {
    let block = r#"<div data-hook="review" id="R4TWICE01">
        <span data-hook="review-body">Même avis rendu deux fois.</span>
      </div>"#;
    let html = wrap(&format!("{block}{block}"));
    let drafts = extract_reviews(&html).unwrap();
    assert_eq!(drafts.len(), 1);
}

#[test]
fn block_without_title_or_body_is_skipped() {
    let html = wrap(
        r#"<div data-hook="review" id="R5EMPTY01">
             <i data-hook="review-star-rating"><span>5,0 sur 5 étoiles</span></i>
           </div>
           <div data-hook="review" id="R6VALID01">
             <span data-hook="review-body">Celui-ci compte.</span>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].review_id, "R6VALID01");
}

#[test]
fn missing_optional_fields_do_not_fail_the_block() {
    let html = wrap(
        r#"<div data-hook="review" id="R7SPARSE1">
             <span data-hook="review-body">Texte seul, sans note ni date.</span>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    let r = &drafts[0];
    assert_eq!(r.rating, None);
    assert_eq!(r.review_date, None);
    assert_eq!(r.helpful_votes, 0);
    assert!(!r.verified_purchase);
    assert_eq!(r.title, None);
}

#[test]
fn fallback_strategy_matches_customer_review_ids() {
    // No [data-hook="review"] anywhere, only id-prefixed containers.
    let html = "<html><body>
        <div id=\"customer_review-R8ALTDOM1\">
          <span data-hook=\"review-body\">Structure alternative.</span>
        </div>
      </body></html>";
    let drafts = extract_reviews(html).unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].review_id, "R8ALTDOM1");
}

#[test]
fn page_without_blocks_is_no_reviews_matched() {
    let err = extract_reviews("<html><body><p>Aucun avis.</p></body></html>").unwrap_err();
    assert!(matches!(err, ParseError::NoReviewsMatched));
}

#[test]
fn invalid_rating_text_leaves_rating_unset() {
    let html = wrap(
        r#"<div data-hook="review" id="R9BADSTAR">
             <i data-hook="review-star-rating"><span>étoiles indisponibles</span></i>
             <span data-hook="review-body">Note illisible mais texte présent.</span>
           </div>"#,
    );
    let drafts = extract_reviews(&html).unwrap();
    assert_eq!(drafts[0].rating, None);
}
