use lendkit_common::{flash_loan::FlashLoanRequest, models::money_bag::MoneyBag};
use tracing::instrument;

use super::{
    borrow_operation, check_borrow_min, clamp_to_available, composed, delivered, ensure_borrow,
    full_balance_bps, rejected, repay_operation, requested_amount, Action, ActionOutput,
    ActionParams, AmountField, Composer,
};
use crate::errors::ComposerError;

impl Composer {
    /// Refinances `src_amount` of `src_asset` debt into `dest_asset` debt.
    ///
    /// The destination asset is flash-borrowed, swapped into the source asset to repay it, and the
    /// loan is settled by borrowing the destination asset. `dest_amount` is the new debt.
    #[instrument(skip_all, fields(src = %params.src_asset, dest = %params.dest_asset, amount = %params.src_amount))]
    pub async fn debt_swap(&self, params: ActionParams<'_>) -> Result<ActionOutput, ComposerError> {
        let action = Action::DebtSwap;
        let portfolio = params.portfolio;
        let Some((src_amount, requested)) = requested_amount(&params)? else {
            return Ok(ActionOutput::noop(portfolio));
        };

        ensure_borrow(portfolio, &params.src_asset)?;
        ensure_borrow(portfolio, &params.dest_asset)?;

        let available = portfolio.max_repay_amount(&params.src_asset);
        let (src_amount, requested, shortfall) =
            clamp_to_available(src_amount, requested, available);
        if let Some(error) = shortfall.filter(|_| requested.is_zero()) {
            return Ok(rejected(action, portfolio.clone(), "0".to_string(), error));
        }

        let protocol = self.protocol_for(portfolio)?;
        let slippage_bps = self.slippage_bps(&params);

        let target = self.repay_target(&src_amount, &params.dest_asset);
        let swap = self
            .quote_exact_out(&params.dest_asset, &target, slippage_bps)
            .await?;
        let flash_loan = self
            .quote_flash_loan(
                portfolio.chain(),
                FlashLoanRequest::Loans(MoneyBag::from_instances([&swap.input])?),
            )
            .await?;
        let dest_amount = flash_loan.repay(&params.dest_asset)?;
        let repaid = delivered(&swap, &src_amount);
        let repaid_value = repaid.to_decimal()?;

        let mut after = portfolio.clone();
        after.repay(&params.src_asset, repaid_value);
        after.borrow(&params.dest_asset, dest_amount.to_decimal()?);
        let violation = shortfall
            .or_else(|| check_borrow_min(&after, &params.dest_asset, AmountField::DestAmount))
            .or_else(|| check_borrow_min(&after, &params.src_asset, AmountField::SrcAmount))
            .or_else(|| self.check_health(&after));
        if let Some(error) = violation {
            return Ok(rejected(action, after, dest_amount.amount(), error));
        }

        let (flash_loan_operation, flash_repay_operation) = flash_loan.operations().await?;
        let mut operations = vec![flash_loan_operation];
        operations.extend(swap.operation(params.account).await?);
        operations.push(
            repay_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                repaid,
                params.interest_rate_mode,
                full_balance_bps(repaid_value, available),
            )
            .await?,
        );
        operations.push(
            borrow_operation(
                protocol.as_ref(),
                portfolio,
                params.account,
                dest_amount.clone(),
                params.interest_rate_mode,
            )
            .await?,
        );
        operations.push(flash_repay_operation);

        Ok(composed(action, after, &dest_amount, operations))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lendkit_common::{
        models::{error::ServiceError, position::InterestRateMode, BPS_BASE},
        portfolio::Portfolio,
        traits::MockSwapper,
    };
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        composer::{ErrorCode, OperationError},
        config::ComposerConfig,
        registry::Registry,
        testing::{
            self, dai, kinds, usdc, wbtc, ACCOUNT, FLASH_LOAN_KIND, FLASH_REPAY_KIND, SWAP_KIND,
        },
    };

    #[tokio::test]
    async fn test_debt_swap_sizes_new_debt_from_flash_repay() {
        let composer = testing::composer();
        let portfolio = testing::portfolio();

        let output = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "1000", &usdc()))
            .await
            .unwrap();

        assert!(output.is_ok());
        assert_eq!(
            kinds(&output.operations),
            vec![FLASH_LOAN_KIND, SWAP_KIND, "aave-v3-repay", "aave-v3-borrow", FLASH_REPAY_KIND]
        );
        // 1000 DAI plus repay slack costs 1000.000001 USDC, plus the 5 bps flash-loan fee.
        assert_eq!(output.dest_amount, "1000.500001");
        assert_eq!(output.after.max_repay_amount(&dai()), dec!(1000));
        assert_eq!(output.after.max_repay_amount(&usdc()), dec!(1000.500001));
        assert_eq!(output.operations[2].fields["balanceBps"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_full_debt_swap_repays_whole_balance() {
        let composer = testing::composer();
        let portfolio = testing::portfolio();

        let output = composer
            .debt_swap(
                ActionParams::new(ACCOUNT, &portfolio, &dai(), "2000", &usdc())
                    .with_interest_rate_mode(InterestRateMode::Variable),
            )
            .await
            .unwrap();

        assert!(output.is_ok());
        let repay = &output.operations[2];
        assert_eq!(repay.fields["balanceBps"], BPS_BASE);
        assert_eq!(repay.fields["interestRateMode"], "variable");
        assert_eq!(repay.fields["borrower"], serde_json::json!(ACCOUNT));
        assert_eq!(output.after.max_repay_amount(&dai()), dec!(0));
    }

    #[tokio::test]
    async fn test_new_debt_below_minimum_is_flagged() {
        let composer = testing::composer();
        let mut snapshot = testing::portfolio().snapshot();
        if let Some(borrow) = snapshot
            .borrows
            .iter_mut()
            .find(|borrow| borrow.asset == usdc())
        {
            borrow.borrow_min = Some(dec!(5000));
        }
        let portfolio = Portfolio::from_snapshot(snapshot);

        let output = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "1000", &usdc()))
            .await
            .unwrap();

        assert_eq!(output.error, Some(OperationError::new(AmountField::DestAmount, ErrorCode::BorrowMin)));
        assert_eq!(output.operations, vec![]);
        assert_eq!(output.dest_amount, "1000.500001");
    }

    #[tokio::test]
    async fn test_requoted_swap_repays_what_it_delivers() {
        let composer = testing::composer_with_swapper(
            testing::swapper()
                .without_exact_out()
                .with_exact_in_haircut_bps(10),
        );
        let portfolio = testing::portfolio();

        let output = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "1000", &usdc()))
            .await
            .unwrap();

        assert!(output.is_ok());
        let repay = &output.operations[2];
        assert_eq!(repay.kind, "aave-v3-repay");
        assert_eq!(repay.fields["input"]["amount"], "999.000000999");
        assert_eq!(repay.fields["balanceBps"], serde_json::Value::Null);
        assert_eq!(output.after.max_repay_amount(&dai()), dec!(1000.999999001));
        assert_eq!(output.dest_amount, "1000.500001");
    }

    #[tokio::test]
    async fn test_clamped_debt_swap_still_projects_both_legs() {
        let composer = testing::composer();
        let portfolio = testing::portfolio();
        let clean = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "2000", &usdc()))
            .await
            .unwrap();

        let output = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "2500", &usdc()))
            .await
            .unwrap();

        assert_eq!(
            output.error,
            Some(OperationError::new(AmountField::SrcAmount, ErrorCode::InsufficientAmount))
        );
        assert_eq!(output.operations, vec![]);
        assert_eq!(output.dest_amount, clean.dest_amount);
        assert_eq!(output.after, clean.after);
    }

    #[tokio::test]
    async fn test_unborrowable_destination_is_rejected() {
        let composer = testing::composer();
        let portfolio = testing::portfolio();

        let err = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "1000", &wbtc()))
            .await
            .unwrap_err();

        assert!(matches!(err, ComposerError::UnknownAsset { position: "borrow", .. }));
    }

    #[tokio::test]
    async fn test_swap_quote_failure_propagates() {
        let mut swapper = MockSwapper::new();
        swapper
            .expect_id()
            .return_const("broken".to_string());
        swapper
            .expect_supports()
            .return_const(true);
        swapper
            .expect_accepts_any_asset()
            .return_const(true);
        swapper
            .expect_quote()
            .returning(|_| Err(ServiceError::InvalidInput("no route".to_string())));
        let registry = Registry::new()
            .with_protocol(Arc::new(testing::protocol()))
            .with_swapper(Arc::new(swapper))
            .with_flash_loan_source(Arc::new(testing::flash_loan_source()));
        let composer = Composer::new(registry, ComposerConfig::default());
        let portfolio = testing::portfolio();

        let err = composer
            .debt_swap(ActionParams::new(ACCOUNT, &portfolio, &dai(), "1000", &usdc()))
            .await
            .unwrap_err();

        assert_eq!(err, ComposerError::Service(ServiceError::InvalidInput("no route".to_string())));
    }
}
